use crate::error::FoodError;
use crate::food::labels::NUM_CLASSES;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};
use log::{debug, info};
use std::path::Path;
use std::str::FromStr;
use tract_onnx::prelude::*;

pub const INPUT_SIZE: u32 = 224;

/// Channel ordering of the model's input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    #[default]
    Nchw,
    Nhwc,
}

impl FromStr for TensorLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nchw" => Ok(TensorLayout::Nchw),
            "nhwc" => Ok(TensorLayout::Nhwc),
            other => Err(format!("Unknown tensor layout '{}', expected nchw or nhwc", other)),
        }
    }
}

/// A pre-trained image classifier over the 101 food classes.
///
/// Implementations receive an image already resized to `input_size()` and
/// return one score per class label. They must not normalize colors: whatever
/// the model expects beyond raw RGB pixels is part of the model artifact.
pub trait FoodClassifier: Send + Sync {
    fn input_size(&self) -> (u32, u32) {
        (INPUT_SIZE, INPUT_SIZE)
    }

    fn classify(&self, image: &RgbImage) -> Result<Vec<f32>, FoodError>;
}

/// Resizes to the classifier's input shape, dropping any alpha channel.
pub fn prepare_input(image: &DynamicImage, (width, height): (u32, u32)) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.to_rgb8();
    }
    image.resize_exact(width, height, FilterType::CatmullRom).to_rgb8()
}

type Plan = TypedRunnableModel<TypedModel>;

pub struct OnnxClassifier {
    plan: Plan,
    layout: TensorLayout,
}

impl OnnxClassifier {
    pub fn load<P: AsRef<Path>>(path: P, layout: TensorLayout) -> Result<Self, FoodError> {
        let path = path.as_ref();
        let load_err = |e: TractError| FoodError::ModelLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        info!("Loading classifier model from {}", path.display());
        let side = INPUT_SIZE as usize;
        let shape = match layout {
            TensorLayout::Nchw => tvec!(1, 3, side, side),
            TensorLayout::Nhwc => tvec!(1, side, side, 3),
        };
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(load_err)?
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), shape))
            .map_err(load_err)?
            .into_optimized()
            .map_err(load_err)?
            .into_runnable()
            .map_err(load_err)?;

        let classifier = Self { plan, layout };

        // A blank frame must produce one score per label, or the model and the
        // label table disagree.
        let blank = RgbImage::new(INPUT_SIZE, INPUT_SIZE);
        classifier.classify(&blank).map_err(|e| FoodError::ModelLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        info!("Classifier ready ({:?} input, {} classes)", layout, NUM_CLASSES);
        Ok(classifier)
    }

    fn to_tensor(&self, image: &RgbImage) -> Tensor {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let tensor = match self.layout {
            TensorLayout::Nchw => {
                tract_ndarray::Array4::from_shape_fn((1, 3, height, width), |(_, c, y, x)| {
                    image.get_pixel(x as u32, y as u32)[c] as f32
                })
            }
            TensorLayout::Nhwc => {
                tract_ndarray::Array4::from_shape_fn((1, height, width, 3), |(_, y, x, c)| {
                    image.get_pixel(x as u32, y as u32)[c] as f32
                })
            }
        };
        tensor.into_tensor()
    }
}

impl FoodClassifier for OnnxClassifier {
    fn classify(&self, image: &RgbImage) -> Result<Vec<f32>, FoodError> {
        let expected = self.input_size();
        if image.dimensions() != expected {
            return Err(FoodError::Inference(format!(
                "expected a {}x{} image, got {}x{}",
                expected.0,
                expected.1,
                image.width(),
                image.height()
            )));
        }

        let input = self.to_tensor(image);
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| FoodError::Inference(e.to_string()))?;
        let output = outputs
            .first()
            .ok_or_else(|| FoodError::Inference("model produced no outputs".to_string()))?;
        let scores: Vec<f32> = output
            .to_array_view::<f32>()
            .map_err(|e| FoodError::Inference(e.to_string()))?
            .iter()
            .copied()
            .collect();

        debug!("Classifier produced {} scores", scores.len());
        if scores.len() != NUM_CLASSES {
            return Err(FoodError::OutputShape {
                expected: NUM_CLASSES,
                actual: scores.len(),
            });
        }
        Ok(scores)
    }
}

use crate::error::FoodError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyValue {
    pub total_fat: String,
    pub saturated_fat: String,
    pub sodium: String,
    pub total_carbohydrates: String,
    pub protein: String,
}

impl DailyValue {
    fn fields(&self) -> [(&'static str, &str); 5] {
        [
            ("totalFat", self.total_fat.as_str()),
            ("saturatedFat", self.saturated_fat.as_str()),
            ("sodium", self.sodium.as_str()),
            ("totalCarbohydrates", self.total_carbohydrates.as_str()),
            ("protein", self.protein.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<String>,
    pub daily_value: DailyValue,
}

/// Display amounts for one dish, in the order they are shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutritionFacts {
    #[serde(rename = "Total Fat")]
    pub total_fat: String,
    #[serde(rename = "Saturated Fat")]
    pub saturated_fat: String,
    #[serde(rename = "Sodium")]
    pub sodium: String,
    #[serde(rename = "Carbohydrates")]
    pub carbohydrates: String,
    #[serde(rename = "Protein")]
    pub protein: String,
}

impl NutritionFacts {
    // Fat, sodium and carbohydrates show the trailing token (the percentage),
    // protein shows its leading amount with a gram suffix.
    pub fn from_daily_value(dv: &DailyValue) -> Self {
        Self {
            total_fat: last_token(&dv.total_fat),
            saturated_fat: last_token(&dv.saturated_fat),
            sodium: last_token(&dv.sodium),
            carbohydrates: last_token(&dv.total_carbohydrates),
            protein: format!("{}g", first_token(&dv.protein)),
        }
    }

    pub fn rows(&self) -> [(&'static str, &str); 5] {
        [
            ("Total Fat", self.total_fat.as_str()),
            ("Saturated Fat", self.saturated_fat.as_str()),
            ("Sodium", self.sodium.as_str()),
            ("Carbohydrates", self.carbohydrates.as_str()),
            ("Protein", self.protein.as_str()),
        ]
    }
}

fn last_token(value: &str) -> String {
    value.split_whitespace().last().unwrap_or_default().to_string()
}

fn first_token(value: &str) -> &str {
    value.split_whitespace().next().unwrap_or_default()
}

/// Read-only dish lookup keyed by canonical name. Matching is exact.
#[derive(Debug, Clone, Default)]
pub struct NutritionTable {
    records: HashMap<String, NutritionRecord>,
}

impl NutritionTable {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FoodError> {
        let path = path.as_ref();
        debug!("Loading nutrition data from {}", path.display());
        let content = fs::read_to_string(path)?;
        let records: Vec<NutritionRecord> = serde_json::from_str(&content)?;
        let table = Self::from_records(records)?;
        info!("Loaded {} nutrition records from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn from_records(records: Vec<NutritionRecord>) -> Result<Self, FoodError> {
        let mut map = HashMap::with_capacity(records.len());
        for record in records {
            for (field, value) in record.daily_value.fields() {
                if value.trim().is_empty() {
                    return Err(FoodError::BlankField {
                        name: record.name.clone(),
                        field,
                    });
                }
            }
            if map.contains_key(&record.name) {
                return Err(FoodError::DuplicateRecord(record.name));
            }
            map.insert(record.name.clone(), record);
        }
        Ok(Self { records: map })
    }

    pub fn get(&self, name: &str) -> Option<&NutritionRecord> {
        self.records.get(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Canonical names from `labels` that have no record, in label order.
    pub fn missing_labels<I, S>(&self, labels: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        labels
            .into_iter()
            .filter(|name| !self.records.contains_key(name.as_ref()))
            .map(|name| name.as_ref().to_string())
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn record(name: &str, protein: &str, sodium: &str) -> NutritionRecord {
    NutritionRecord {
        name: name.to_string(),
        calories: None,
        daily_value: DailyValue {
            total_fat: "10 g 13%".to_string(),
            saturated_fat: "4.5 g 23%".to_string(),
            sodium: sodium.to_string(),
            total_carbohydrates: "36 g 13%".to_string(),
            protein: protein.to_string(),
        },
    }
}

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Model;

/// Temperature used until the user picks another.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Temperatures move in steps of this size, like the slider they stand in for.
pub const TEMPERATURE_STEP: f32 = 0.1;

/// Global completion settings, shared by every thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// The model to request completions from.
    pub model: Model,

    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,
}

impl Settings {
    /// Returns a copy with the given model.
    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Returns a copy with the given temperature, validated and snapped to the step.
    pub fn with_temperature(mut self, temperature: f32) -> Result<Self> {
        self.temperature = snap_temperature(temperature)?;
        Ok(self)
    }

    /// Repairs settings that came from storage rather than from the user: an unlisted model falls
    /// back to the default and the temperature is clamped and snapped.
    pub(crate) fn sanitized(mut self) -> Self {
        if !matches!(self.model, Model::Known(_)) {
            self.model = Model::default();
        }
        self.temperature = if self.temperature.is_finite() {
            snap(self.temperature.clamp(0.0, 1.0))
        } else {
            DEFAULT_TEMPERATURE
        };
        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: Model::default(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Validate a user-supplied temperature and round it to the nearest step.
pub fn snap_temperature(temperature: f32) -> Result<f32> {
    if !temperature.is_finite() || !(0.0..=1.0).contains(&temperature) {
        return Err(Error::validation(
            format!("temperature must be between 0 and 1, got {temperature}"),
            Some("temperature".to_string()),
        ));
    }
    Ok(snap(temperature))
}

fn snap(temperature: f32) -> f32 {
    let steps = (temperature / TEMPERATURE_STEP).round();
    // Dividing keeps 0.7 as the float nearest 0.7 rather than 7.0 * 0.1.
    steps / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KnownModel;

    #[test]
    fn default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.model, Model::Known(KnownModel::Llama31_8BInstructFp8));
        assert_eq!(settings.temperature, 0.7);
    }

    #[test]
    fn temperature_snaps_to_step() {
        assert_eq!(snap_temperature(0.64).unwrap(), 0.6);
        assert_eq!(snap_temperature(0.66).unwrap(), 0.7);
        assert_eq!(snap_temperature(1.0).unwrap(), 1.0);
        assert_eq!(snap_temperature(0.0).unwrap(), 0.0);
    }

    #[test]
    fn temperature_out_of_range() {
        assert!(snap_temperature(1.01).unwrap_err().is_validation());
        assert!(snap_temperature(-0.1).is_err());
        assert!(snap_temperature(f32::NAN).is_err());
    }

    #[test]
    fn sanitize_stored_values() {
        let stored = Settings {
            model: Model::default(),
            temperature: 3.0,
        };
        assert_eq!(stored.sanitized().temperature, 1.0);

        let stored = Settings {
            model: Model::default(),
            temperature: f32::INFINITY,
        };
        assert_eq!(stored.sanitized().temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn unlisted_stored_model_falls_back_to_default() {
        let json = r#"{"model":"gpt-4o","temperature":0.3}"#;
        let stored: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(stored.model, Model::Custom("gpt-4o".to_string()));

        let settings = stored.sanitized();
        assert_eq!(settings.model, Model::default());
        assert_eq!(settings.temperature, 0.3);
    }

    #[test]
    fn settings_round_trip_from_legacy_json() {
        let json = r#"{"model":"Meta-Llama-3-2-3B-Instruct","temperature":0.3}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.model, Model::Known(KnownModel::Llama32_3BInstruct));
        assert_eq!(settings.temperature, 0.3);
    }
}

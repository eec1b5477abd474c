use serde::{Deserialize, Serialize};

use crate::error::{TciError, TciResult};

/// Pump configuration shared by every solve of a simulation session.
///
/// Rates are ml/hr in the drug's concentration unit; times are seconds.
/// A `max_infusion_rate` of -1 disables rate capping entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpConfig {
    /// Concentration of the infused drug preparation (model concentration unit).
    pub drug_concentration: f64,
    /// Duration of the simulation in seconds.
    pub end_time: f64,
    /// Default plasma overshoot multiplier for effect-site targets.
    pub cp_limit: f64,
    /// Default time to reach the overshoot plateau in seconds.
    pub cp_limit_duration: f64,
    /// Duration of the first maintenance infusion in seconds.
    pub maintenance_infusion_duration: f64,
    /// Each subsequent maintenance infusion is lengthened by this factor.
    pub maintenance_infusion_multiplier: f64,
    /// Pump rate ceiling in ml/hr; -1 disables the cap.
    pub max_infusion_rate: f64,
    /// Infusions no longer than this count as boluses and escape the cap.
    pub bolus_time: f64,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            drug_concentration: 1.0,
            end_time: 3600.0,
            cp_limit: 1.2,
            cp_limit_duration: 10.0,
            maintenance_infusion_duration: 300.0,
            maintenance_infusion_multiplier: 2.0,
            max_infusion_rate: 1200.0,
            bolus_time: 20.0,
        }
    }
}

impl PumpConfig {
    pub fn new(drug_concentration: f64, end_time: f64) -> Self {
        Self {
            drug_concentration,
            end_time,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> TciResult<()> {
        if self.drug_concentration <= 0.0 {
            return Err(TciError::InvalidInput(
                "drug_concentration must be greater than 0".to_string(),
            ));
        }
        if self.end_time <= 0.0 {
            return Err(TciError::InvalidInput(
                "end_time must be greater than 0".to_string(),
            ));
        }
        if self.cp_limit <= 0.0 {
            return Err(TciError::InvalidInput(
                "cp_limit must be greater than 0".to_string(),
            ));
        }
        if self.cp_limit_duration <= 0.0 {
            return Err(TciError::InvalidInput(
                "cp_limit_duration must be greater than 0".to_string(),
            ));
        }
        if self.maintenance_infusion_duration < 1.0 {
            return Err(TciError::InvalidInput(
                "maintenance_infusion_duration must be at least 1 second".to_string(),
            ));
        }
        if self.maintenance_infusion_multiplier < 1.0 {
            return Err(TciError::InvalidInput(
                "maintenance_infusion_multiplier must be at least 1".to_string(),
            ));
        }
        if self.max_infusion_rate <= 0.0 && self.max_infusion_rate != -1.0 {
            return Err(TciError::InvalidInput(
                "max_infusion_rate must be positive, or -1 to disable".to_string(),
            ));
        }
        if self.bolus_time <= 0.0 {
            return Err(TciError::InvalidInput(
                "bolus_time must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Pump rate in ml/hr for a dose expressed per second.
    pub fn rate_ml_per_hr(&self, dose_per_sec: f64) -> f64 {
        dose_per_sec / self.drug_concentration * 3600.0
    }

    /// Dose per second delivered at the configured maximum rate.
    pub fn dose_at_max_rate(&self) -> f64 {
        self.max_infusion_rate * self.drug_concentration / 3600.0
    }

    /// Whether rate capping is in force at all.
    pub fn rate_capped(&self) -> bool {
        self.max_infusion_rate != -1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = PumpConfig::new(10.0, 3600.0);
        assert!(config.validate().is_ok());
        assert_relative_eq!(config.cp_limit, 1.2);
        assert_relative_eq!(config.maintenance_infusion_duration, 300.0);
        assert_relative_eq!(config.bolus_time, 20.0);
    }

    #[test]
    fn test_rejects_nonpositive_concentration() {
        let config = PumpConfig::new(0.0, 3600.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_rate_cap_is_valid() {
        let mut config = PumpConfig::new(10.0, 3600.0);
        config.max_infusion_rate = -1.0;
        assert!(config.validate().is_ok());
        assert!(!config.rate_capped());
    }

    #[test]
    fn test_rate_conversion() {
        let config = PumpConfig::new(10.0, 3600.0);
        // 1 unit/s at 10 units/ml is 0.1 ml/s, i.e. 360 ml/hr.
        assert_relative_eq!(config.rate_ml_per_hr(1.0), 360.0);
        assert_relative_eq!(config.dose_at_max_rate(), 1200.0 * 10.0 / 3600.0);
    }
}

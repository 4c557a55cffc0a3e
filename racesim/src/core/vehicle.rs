use crate::error::RaceError;
use serde::{Deserialize, Serialize};

/// (kg/m^3) Air density used for the aerodynamic drag of all vehicles.
pub const AIR_DENSITY: f64 = 1.225;

/// * `id` - Vehicle id used by the catalog, e.g. daewoo_matiz_2005
/// * `name` - Display name of the vehicle
/// * `power` - (kW) Engine power
/// * `mass` - (kg) Vehicle mass
/// * `cd` - (-) Drag coefficient
/// * `area` - (m^2) Frontal area
/// * `tire_grip` - (-) Scalar tire grip coefficient
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VehiclePars {
    pub id: String,
    pub name: String,
    pub power: f64,
    pub mass: f64,
    #[serde(alias = "drag_coefficient")]
    pub cd: f64,
    #[serde(alias = "frontal_area")]
    pub area: f64,
    pub tire_grip: f64,
}

/// Vehicle is immutable during a race. It is constructed from its parameters and passed by
/// value into the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: String,
    pub name: String,
    pub power: f64,
    pub mass: f64,
    pub drag_coefficient: f64,
    pub frontal_area: f64,
    pub tire_grip: f64,
}

impl Vehicle {
    pub fn new(vehicle_pars: &VehiclePars) -> Vehicle {
        Vehicle {
            id: vehicle_pars.id.to_owned(),
            name: vehicle_pars.name.to_owned(),
            power: vehicle_pars.power,
            mass: vehicle_pars.mass,
            drag_coefficient: vehicle_pars.cd,
            frontal_area: vehicle_pars.area,
            tire_grip: vehicle_pars.tire_grip,
        }
    }

    /// (W) Engine power.
    pub fn power_watts(&self) -> f64 {
        self.power * 1000.0
    }

    /// (kg/m) Factor k in the drag force F = k * v^2.
    pub fn drag_factor(&self, rho: f64) -> f64 {
        0.5 * self.drag_coefficient * rho * self.frontal_area
    }

    /// (m/s) Top speed at which the whole engine power is consumed by aerodynamic drag.
    pub fn max_power_limited_speed(&self, rho: f64) -> f64 {
        (self.power_watts() / self.drag_factor(rho).max(1e-9)).cbrt()
    }

    /// The method checks that all parameters the physics model divides by or scales with are
    /// usable.
    pub fn validate(&self) -> Result<(), RaceError> {
        let checks = [
            ("power", self.power),
            ("mass", self.mass),
            ("drag coefficient", self.drag_coefficient),
            ("frontal area", self.frontal_area),
            ("tire grip", self.tire_grip),
        ];

        for (label, value) in checks.iter() {
            if !value.is_finite() || *value <= 0.0 {
                return Err(RaceError::Configuration(format!(
                    "vehicle {} has invalid {}: {}",
                    self.id, label, value
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pars() -> VehiclePars {
        VehiclePars {
            id: "c".to_owned(),
            name: "Car".to_owned(),
            power: 100.0,
            mass: 1000.0,
            cd: 0.35,
            area: 2.0,
            tire_grip: 1.0,
        }
    }

    #[test]
    fn derived_quantities() {
        let vehicle = Vehicle::new(&pars());
        assert_relative_eq!(vehicle.power_watts(), 100_000.0);

        let expected = (100_000.0 / (0.5 * 0.35 * AIR_DENSITY * 2.0)).powf(1.0 / 3.0);
        assert_relative_eq!(
            vehicle.max_power_limited_speed(AIR_DENSITY),
            expected,
            epsilon = 1e-9
        );
    }

    #[test]
    fn zero_mass_is_rejected() {
        let mut vehicle_pars = pars();
        vehicle_pars.mass = 0.0;
        let err = Vehicle::new(&vehicle_pars).validate().unwrap_err();
        assert!(matches!(err, RaceError::Configuration(_)));
        assert!(err.to_string().contains("mass"));
    }

    #[test]
    fn long_field_names_deserialize() {
        let vehicle_pars: VehiclePars = serde_json::from_str(
            r#"{"id":"x","name":"X","power":38,"mass":800,"drag_coefficient":0.32,
                "frontal_area":1.9,"tire_grip":0.9}"#,
        )
        .unwrap();
        assert_relative_eq!(vehicle_pars.cd, 0.32);
        assert_relative_eq!(vehicle_pars.area, 1.9);
    }
}

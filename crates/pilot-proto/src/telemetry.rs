use serde::{de, Deserialize, Deserializer, Serialize};

/// Point-in-time bundle of what the ground station reports about the vehicle.
///
/// Every group and every field is optional on the wire. Missing values and
/// JSON `null` both fall back to zero/empty/false; a value of the wrong type
/// is a deserialization error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<Battery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps: Option<Gps>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<FlightStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attitude: Option<Attitude>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<Speed>,
}

impl TelemetrySnapshot {
    pub fn is_empty(&self) -> bool {
        self.battery.is_none()
            && self.gps.is_none()
            && self.status.is_none()
            && self.attitude.is_none()
            && self.speed.is_none()
    }

    pub fn battery_voltage(&self) -> f32 {
        self.battery.as_ref().map(|b| b.voltage).unwrap_or_default()
    }

    pub fn satellites(&self) -> i32 {
        self.gps.as_ref().map(|g| g.satellites).unwrap_or_default()
    }

    pub fn flight_mode(&self) -> &str {
        self.status.as_ref().map(|s| s.mode.as_str()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Battery {
    #[serde(deserialize_with = "null_as_default")]
    pub voltage: f32,   // Volts
    #[serde(deserialize_with = "null_as_default")]
    pub current: f32,   // Amps
    #[serde(deserialize_with = "null_as_default")]
    pub remaining: f32, // Percent 0-100
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gps {
    #[serde(deserialize_with = "satellite_count")]
    pub satellites: i32,
    #[serde(alias = "latitude", deserialize_with = "null_as_default")]
    pub lat: f64,
    #[serde(alias = "longitude", deserialize_with = "null_as_default")]
    pub lon: f64,
    /// Metres.
    #[serde(alias = "altitude", deserialize_with = "null_as_default")]
    pub alt: f32,
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub fix_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightStatus {
    #[serde(deserialize_with = "null_as_default")]
    pub mode: String,
    #[serde(deserialize_with = "null_as_default")]
    pub armed: bool,
}

/// Degrees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attitude {
    #[serde(deserialize_with = "null_as_default")]
    pub roll: f32,
    #[serde(deserialize_with = "null_as_default")]
    pub pitch: f32,
    #[serde(deserialize_with = "null_as_default")]
    pub yaw: f32,
}

/// Metres per second.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Speed {
    #[serde(deserialize_with = "null_as_default")]
    pub ground_speed: f32,
    #[serde(deserialize_with = "null_as_default")]
    pub air_speed: f32,
    #[serde(deserialize_with = "null_as_default")]
    pub climb_rate: f32,
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

// Ground stations commonly report the satellite count as a float (12.0).
// Integral floats are accepted, fractional ones are a type error.
fn satellite_count<'de, D>(d: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Int(i64),
        Float(f64),
    }

    match Option::<Count>::deserialize(d)? {
        None => Ok(0),
        Some(Count::Int(n)) => i32::try_from(n)
            .map_err(|_| de::Error::custom(format!("satellite count out of range: {}", n))),
        Some(Count::Float(f)) => {
            if f.fract() != 0.0 || !f.is_finite() || f.abs() > i32::MAX as f64 {
                return Err(de::Error::custom(format!("satellite count is not an integer: {}", f)));
            }
            Ok(f as i32)
        }
    }
}

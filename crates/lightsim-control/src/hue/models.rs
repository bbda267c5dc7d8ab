use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Singleton entertainment configuration id
pub const DEFAULT_ENTERTAINMENT_ID: &str = "default";

/// A light resource as reported by the bridge.
///
/// Everything except `id` stays unset until first written and then persists
/// across partial updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightState {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimming: Option<Dimming>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    /// Last streamed color. Only the entertainment path sets it; any
    /// resource-API write clears it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_rgb: Option<[u8; 3]>,
}

impl LightState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Brightness, if set
    pub fn brightness(&self) -> Option<i32> {
        self.dimming.as_ref().and_then(|d| d.brightness)
    }

    /// Chromaticity, if set
    pub fn xy(&self) -> Option<Xy> {
        self.color.as_ref().and_then(|c| c.xy)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimming {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<i32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Color {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xy: Option<Xy>,
}

/// CIE 1931 chromaticity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Xy {
    pub x: f64,
    pub y: f64,
}

impl Xy {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// `{"on": bool}` sub-object of a light update
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OnUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
}

/// Body of `PUT /clip/v2/resource/light/{id}`. Each sub-object is merged
/// field by field into the stored record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<OnUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimming: Option<Dimming>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl LightUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on(mut self, on: bool) -> Self {
        self.on = Some(OnUpdate { on: Some(on) });
        self
    }

    pub fn with_brightness(mut self, brightness: i32) -> Self {
        self.dimming = Some(Dimming {
            brightness: Some(brightness),
        });
        self
    }

    pub fn with_xy(mut self, x: f64, y: f64) -> Self {
        self.color = Some(Color {
            xy: Some(Xy::new(x, y)),
        });
        self
    }

    /// Check the parameters against the resource model
    pub fn validate(&self) -> Result<(), String> {
        if let Some(brightness) = self.dimming.and_then(|d| d.brightness) {
            if !(0..=100).contains(&brightness) {
                return Err(format!(
                    "brightness must be between 0 and 100, got {}",
                    brightness
                ));
            }
        }
        if let Some(xy) = self.color.and_then(|c| c.xy) {
            if !xy.x.is_finite() || !xy.y.is_finite() {
                return Err("color.xy must be finite".to_string());
            }
        }
        Ok(())
    }

    /// Merge into `light`. `on: {}` keeps the current value and defaults a
    /// never-set light to off.
    pub fn apply_to(&self, light: &mut LightState) {
        if let Some(on) = self.on {
            light.on = Some(on.on.or(light.on).unwrap_or(false));
        }
        if let Some(brightness) = self.dimming.and_then(|d| d.brightness) {
            light.dimming.get_or_insert_with(Dimming::default).brightness = Some(brightness);
        }
        if let Some(xy) = self.color.and_then(|c| c.xy) {
            light.color.get_or_insert_with(Color::default).xy = Some(xy);
        }
        light.stream_rgb = None;
    }
}

/// Error entry in a resource-API envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub description: String,
}

/// `{data: [...], errors: [...]}` envelope used by every resource endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default = "Vec::new")]
    pub errors: Vec<ApiError>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: Vec<T>) -> Self {
        Self {
            data,
            errors: Vec::new(),
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self {
            data: Vec::new(),
            errors: vec![ApiError {
                description: description.into(),
            }],
        }
    }
}

/// An envelope plus the status code it is served with
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeResponse<T> {
    pub status: StatusCode,
    pub body: ApiResponse<T>,
}

impl<T> BridgeResponse<T> {
    pub fn ok(data: Vec<T>) -> Self {
        Self {
            status: StatusCode::OK,
            body: ApiResponse::success(data),
        }
    }

    pub fn error(status: StatusCode, description: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiResponse::error(description),
        }
    }

    /// First data item, if any
    pub fn first(&self) -> Option<&T> {
        self.body.data.first()
    }
}

/// Streaming state of the entertainment configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Active,
    Inactive,
}

/// Action accepted by the entertainment configuration endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamAction {
    Start,
    Stop,
}

impl std::str::FromStr for StreamAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(StreamAction::Start),
            "stop" => Ok(StreamAction::Stop),
            other => Err(format!("unsupported action '{}'", other)),
        }
    }
}

/// Body of `PUT .../entertainment_configuration/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntertainmentActionRequest {
    pub action: String,
}

/// Reply item for an entertainment action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntertainmentStatus {
    pub id: String,
    pub status: StreamStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntertainmentMetadata {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub rid: String,
    pub rtype: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMember {
    pub service: ResourceRef,
}

/// One streaming channel of the entertainment configuration.
/// `channel_id` is the id used inside stream packets, not the light id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntertainmentChannel {
    pub channel_id: u8,
    pub position: Position,
    #[serde(default)]
    pub members: Vec<ChannelMember>,
}

impl EntertainmentChannel {
    /// Light id of the first member
    pub fn light_id(&self) -> Option<&str> {
        self.members.first().map(|m| m.service.rid.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntertainmentConfiguration {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub metadata: EntertainmentMetadata,
    pub channels: Vec<EntertainmentChannel>,
    pub status: StreamStatus,
}

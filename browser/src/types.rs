use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabState {
    pub title: String,
    pub url: String,
    pub favicon: Option<String>,
    pub state: TabActivity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabActivity {
    pub loading: bool,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotFormat {
    Png,
    Jpeg,
}

impl ScreenshotFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ScreenshotFormat::Png => "png",
            ScreenshotFormat::Jpeg => "jpg",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotOptions {
    #[serde(default = "default_format")]
    pub r#type: ScreenshotFormat,
    pub quality: Option<u8>,
    #[serde(default)]
    pub full_page: bool,
    pub clip: Option<ClipRegion>,
    #[serde(default)]
    pub omit_background: bool,
    #[serde(default = "default_scale")]
    pub scale: ScreenshotScale,
    #[serde(default)]
    pub animations: AnimationsOption,
    #[serde(default)]
    pub caret: CaretOption,
    pub timeout_ms: Option<u64>,
    pub path: Option<String>,
}

fn default_format() -> ScreenshotFormat {
    ScreenshotFormat::Png
}

fn default_scale() -> ScreenshotScale {
    ScreenshotScale::Css
}

/// Whether CSS animations/transitions keep running during capture, or get
/// frozen at their first frame so the shot is deterministic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnimationsOption {
    Allow,
    Disabled,
}

impl Default for AnimationsOption {
    fn default() -> Self {
        AnimationsOption::Allow
    }
}

/// Whether the text input caret is hidden for the capture, or left in
/// whatever state the page was already in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CaretOption {
    Hide,
    Initial,
}

impl Default for CaretOption {
    fn default() -> Self {
        CaretOption::Initial
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotScale {
    Css,
    Device,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub box_id: String,
    pub context_id: String,
    pub page_id: String,
    pub action_type: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: Option<String>,
    pub tab_state: Option<Vec<TabState>>,
}

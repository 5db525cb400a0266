use std::collections::BTreeMap;

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A CMS video as returned by the `videos` endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CustomFields {
    pub sourceid: String,
    pub musictrack: String,
    pub musictrackauthor: String,
    pub musictrackurl: String,
    pub filename: String,
    pub ytvideourl: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub url: String,
    pub text: String,
}

/// Body of the create-video call.
#[derive(Debug, Clone, PartialEq, Serialize, Builder)]
pub struct NewVideo {
    #[builder(into)]
    pub name: String,
    #[builder(into)]
    pub reference_id: String,
    #[builder(into)]
    pub state: String,
    #[builder(default)]
    pub tags: Vec<String>,
    #[builder(default)]
    pub custom_fields: CustomFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
}

/// Signed S3 destination for a source file plus the URL ingest reads it from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadUrls {
    pub signed_url: String,
    pub api_request_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestAsset {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestRequest {
    pub master: IngestAsset,
    pub profile: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<IngestAsset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<IngestAsset>,
    #[serde(rename = "capture-images", skip_serializing_if = "Option::is_none")]
    pub capture_images: Option<bool>,
}

impl IngestRequest {
    pub fn new(master_url: impl Into<String>, profile: impl Into<String>) -> Self {
        Self {
            master: IngestAsset {
                url: master_url.into(),
            },
            profile: profile.into(),
            poster: None,
            thumbnail: None,
            capture_images: None,
        }
    }

    /// Supplied stills replace the images ingest would otherwise capture.
    pub fn with_stills(mut self, poster: Option<String>, thumbnail: Option<String>) -> Self {
        self.poster = poster.map(|url| IngestAsset { url });
        self.thumbnail = thumbnail.map(|url| IngestAsset { url });
        if self.poster.is_some() || self.thumbnail.is_some() {
            self.capture_images = Some(false);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefIdUpdate {
    Updated,
    /// Another video already holds the requested reference id.
    Conflict,
}

//! HTTP adapter for an upstream generation worker.
//!
//! Upstream contract:
//!
//! | Method | Path       | Body                              | Response                      |
//! |--------|------------|-----------------------------------|-------------------------------|
//! | GET    | `/info`    |                                   | capabilities + script lists   |
//! | POST   | `/txt2img` | call fields + `args` frame        | `{images: [b64], info}`       |
//! | POST   | `/img2img` | call fields + `init_img`, `mask`  | `{images: [b64], info}`       |
//! | POST   | `/upscale` | `{image, upscaler_name}`          | `{image}`                     |

use async_trait::async_trait;
use image::{DynamicImage, GrayImage};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{EngineCapabilities, EngineOutput, GenerationEngine, Img2ImgCall, Txt2ImgCall};
use crate::error::EngineError;
use crate::output::{decode_base64_image, encode_png_base64};
use crate::scripts::{ScriptKind, ScriptSpec};

/// `GET /info` payload.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EngineInfo {
    #[serde(flatten)]
    capabilities: EngineCapabilities,
    scripts_txt2img: Vec<ScriptSpec>,
    scripts_img2img: Vec<ScriptSpec>,
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    images: Vec<String>,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Serialize)]
struct UpscaleRequest<'a> {
    image: String,
    upscaler_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct UpscaleReply {
    image: String,
}

/// Engine reached over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteEngine {
    client: Client,
    base_url: String,
}

impl RemoteEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, EngineError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(upstream_error(status.as_u16(), text));
        }
        response
            .json()
            .await
            .map_err(|e| EngineError::Decode(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, EngineError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| EngineError::Request(e.to_string()))?;
        Self::read_json(response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, EngineError> {
        debug!(url = %self.url(path), "Forwarding to engine");
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| EngineError::Request(e.to_string()))?;
        Self::read_json(response).await
    }

    async fn info(&self) -> Result<EngineInfo, EngineError> {
        self.get_json("info").await
    }
}

fn encode(image: &DynamicImage) -> Result<String, EngineError> {
    encode_png_base64(image).map_err(|e| EngineError::Request(e.to_string()))
}

fn decode(data: &str) -> Result<DynamicImage, EngineError> {
    decode_base64_image(data).map_err(|e| EngineError::Decode(e.to_string()))
}

fn decode_reply(reply: GenerateReply) -> Result<EngineOutput, EngineError> {
    let images = reply
        .images
        .iter()
        .map(|data| decode(data))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(EngineOutput {
        images,
        info: reply.info,
    })
}

fn encode_mask(mask: Option<&GrayImage>) -> Result<Value, EngineError> {
    match mask {
        Some(mask) => Ok(Value::String(encode(&DynamicImage::ImageLuma8(mask.clone()))?)),
        None => Ok(Value::Null),
    }
}

#[async_trait]
impl GenerationEngine for RemoteEngine {
    async fn capabilities(&self) -> Result<EngineCapabilities, EngineError> {
        Ok(self.info().await?.capabilities)
    }

    async fn scripts(&self, kind: ScriptKind) -> Result<Vec<ScriptSpec>, EngineError> {
        let info = self.info().await?;
        Ok(match kind {
            ScriptKind::Txt2Img => info.scripts_txt2img,
            ScriptKind::Img2Img => info.scripts_img2img,
        })
    }

    async fn txt2img(&self, call: Txt2ImgCall) -> Result<EngineOutput, EngineError> {
        let reply: GenerateReply = self.post_json("txt2img", &call).await?;
        decode_reply(reply)
    }

    async fn img2img(&self, call: Img2ImgCall) -> Result<EngineOutput, EngineError> {
        let mut body = serde_json::to_value(&call).map_err(|e| EngineError::Request(e.to_string()))?;
        if let Some(object) = body.as_object_mut() {
            object.insert("init_img".to_string(), Value::String(encode(&call.init_image)?));
            object.insert("mask".to_string(), encode_mask(call.mask.as_ref())?);
        }
        let reply: GenerateReply = self.post_json("img2img", &body).await?;
        decode_reply(reply)
    }

    async fn upscale(&self, image: DynamicImage, upscaler: &str) -> Result<DynamicImage, EngineError> {
        let request = UpscaleRequest {
            image: encode(&image)?,
            upscaler_name: upscaler,
        };
        let reply: UpscaleReply = self.post_json("upscale", &request).await?;
        decode(&reply.image)
    }
}

/// Error for a non-success upstream reply. JSON bodies contribute their
/// `message` or `detail` field; anything else is kept verbatim.
fn upstream_error(status: u16, text: String) -> EngineError {
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|body| {
            body.get("message")
                .or_else(|| body.get("detail"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(text);
    EngineError::Status { status, message }
}

//! Image inference and pool control over gRPC.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::gateway::{Gateway, InferenceRequest};
use crate::kernel::CellValue;
use crate::pool::RequestGuard;

use super::proto::ai_model_service_server::AiModelService;
use super::proto::{
    DetectionRow, ImageRequest, ImageResponse, ModelControlRequest, ModelControlResponse,
};

pub struct AiModelServiceImpl {
    gateway: Arc<Gateway>,
}

impl AiModelServiceImpl {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// In-band diagnostic for backpressure outcomes, assembled the way the
    /// status endpoints describe the pool.
    fn backpressure_message(&self, err: &GatewayError) -> String {
        let timeout = self
            .gateway
            .config()
            .general
            .concurrency
            .model_acquire_timeout_ms;
        match err {
            GatewayError::Disabled(t) => {
                format!("Model inference failed for type {t} - model pool is disabled")
            }
            GatewayError::Busy(t) => format!(
                "Model inference failed for type {t} - all model instances are busy (timeout after {timeout}ms)"
            ),
            other => other.to_string(),
        }
    }
}

#[tonic::async_trait]
impl AiModelService for AiModelServiceImpl {
    async fn process_image(
        &self,
        request: Request<ImageRequest>,
    ) -> Result<Response<ImageResponse>, Status> {
        let guard = RequestGuard::new(self.gateway.grpc_monitor());
        let request = request.into_inner();

        if request.image_base64.is_empty() {
            guard.fail();
            return Err(Status::invalid_argument("empty image data"));
        }
        let model_type = match u32::try_from(request.model_type) {
            Ok(t) if t > 0 => t,
            _ => {
                guard.fail();
                return Err(Status::invalid_argument("invalid model type"));
            }
        };

        let bytes = match BASE64.decode(request.image_base64.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                guard.fail();
                return Err(Status::invalid_argument(format!("base64 decode failed: {e}")));
            }
        };
        let image = match image::load_from_memory(&bytes) {
            Ok(image) => image,
            Err(e) => {
                guard.fail();
                return Err(Status::invalid_argument(format!("image decode failed: {e}")));
            }
        };
        debug!(
            model_type,
            width = image.width(),
            height = image.height(),
            "processing gRPC inference request"
        );

        let result = self
            .gateway
            .execute_inference(InferenceRequest {
                model_type,
                image,
                start_value: 0.0,
                end_value: 0.0,
                timeout_ms: -1,
            })
            .await;

        match result {
            Ok(response) => {
                let detection_results = response
                    .detections
                    .iter()
                    .map(|row| DetectionRow {
                        values: row.iter().filter_map(CellValue::as_f32).collect(),
                    })
                    .collect();
                Ok(Response::new(ImageResponse {
                    success: true,
                    message: format!(
                        "Processing successful (time: {}ms)",
                        response.elapsed_ms
                    ),
                    detection_results,
                    plate_results: response.plates,
                }))
            }
            Err(e) => {
                guard.fail();
                match e.rpc_code() {
                    // Disabled/Busy are reported in-band so clients can
                    // distinguish backpressure from transport failure.
                    None => Ok(Response::new(ImageResponse {
                        success: false,
                        message: self.backpressure_message(&e),
                        detection_results: Vec::new(),
                        plate_results: Vec::new(),
                    })),
                    Some(code) => Err(Status::new(code, e.to_string())),
                }
            }
        }
    }

    async fn control_model(
        &self,
        request: Request<ModelControlRequest>,
    ) -> Result<Response<ModelControlResponse>, Status> {
        let guard = RequestGuard::new(self.gateway.grpc_monitor());
        let request = request.into_inner();

        if request.model_name.is_empty() {
            guard.fail();
            return Err(Status::invalid_argument("empty model name"));
        }
        let model_type = match u32::try_from(request.model_type) {
            Ok(t) if t > 0 => t,
            _ => {
                guard.fail();
                return Err(Status::invalid_argument("invalid model type"));
            }
        };

        if !self.gateway.set_model_enabled(model_type, request.enabled) {
            guard.fail();
            warn!(model_type, "model pool not found for control request");
            return Err(Status::not_found("model pool not found"));
        }

        let enabled = self.gateway.is_model_enabled(model_type);
        info!(model_type, enabled, "model pool control applied");
        Ok(Response::new(ModelControlResponse {
            success: true,
            model_name: request.model_name,
            enabled,
        }))
    }
}

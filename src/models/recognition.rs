use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::job::{Job, JobResult};

/// Inbound work item as received from a requester.
#[derive(Debug, Clone, Validate)]
pub struct RecognizeRequest {
    #[garde(range(min = 0))]
    pub batch_id: i64,

    #[garde(range(min = 0))]
    pub image_index: i32,

    #[garde(length(min = 1, max = 255))]
    pub filename: String,

    #[garde(length(min = 1))]
    pub image_data: Vec<u8>,
}

/// Outbound result item returned to the requester.
///
/// Recognition failures are reported in-band through `success` and
/// `error_message`, never as a transport error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecognizeResponse {
    pub batch_id: i64,
    pub image_index: i32,
    pub filename: String,
    pub text: String,
    pub success: bool,
    pub error_message: String,
    pub processing_time_ms: i64,
}

impl From<RecognizeRequest> for Job {
    fn from(req: RecognizeRequest) -> Self {
        Job {
            batch_id: req.batch_id,
            index: req.image_index,
            label: req.filename,
            payload: req.image_data,
        }
    }
}

impl From<JobResult> for RecognizeResponse {
    fn from(result: JobResult) -> Self {
        Self {
            batch_id: result.batch_id,
            image_index: result.index,
            filename: result.label,
            text: result.text,
            success: result.ok,
            error_message: result.error_message,
            processing_time_ms: i64::try_from(result.elapsed_ms).unwrap_or(i64::MAX),
        }
    }
}

impl From<RecognizeResponse> for JobResult {
    fn from(res: RecognizeResponse) -> Self {
        Self {
            batch_id: res.batch_id,
            index: res.image_index,
            label: res.filename,
            text: if res.success { res.text } else { String::new() },
            elapsed_ms: u64::try_from(res.processing_time_ms).unwrap_or(0),
            ok: res.success,
            error_message: res.error_message,
        }
    }
}

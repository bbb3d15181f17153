use std::time::Duration;

use reqwest::multipart;
use reqwest::Client;
use tokio::sync::mpsc;

use crate::models::job::{Job, JobResult};
use crate::models::recognition::RecognizeResponse;
use crate::services::batch_tracker::JobSink;

/// Sends each job to a remote recognition service on its own task and
/// delivers the outcome to the requester's result channel.
///
/// Must be used from inside a tokio runtime.
#[derive(Clone)]
pub struct HttpJobSink {
    http: Client,
    endpoint: String,
    results: mpsc::UnboundedSender<JobResult>,
}

impl HttpJobSink {
    pub fn new(
        base_url: &str,
        results: mpsc::UnboundedSender<JobResult>,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self {
            http,
            endpoint: format!("{}/api/v1/recognize", base_url.trim_end_matches('/')),
            results,
        })
    }

    async fn send(http: &Client, endpoint: &str, job: &Job) -> Result<JobResult, ClientError> {
        let form = multipart::Form::new()
            .text("batch_id", job.batch_id.to_string())
            .text("image_index", job.index.to_string())
            .text("filename", job.label.clone())
            .part(
                "image",
                multipart::Part::bytes(job.payload.clone()).file_name(job.label.clone()),
            );

        let response = http.post(endpoint).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: RecognizeResponse = response.json().await?;
        Ok(body.into())
    }
}

impl JobSink for HttpJobSink {
    fn dispatch(&self, job: Job) {
        let http = self.http.clone();
        let endpoint = self.endpoint.clone();
        let results = self.results.clone();

        tokio::spawn(async move {
            let result = match Self::send(&http, &endpoint, &job).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(
                        batch_id = job.batch_id,
                        index = job.index,
                        filename = %job.label,
                        error = %e,
                        "Recognition request failed"
                    );
                    JobResult::failure(&job, e.to_string())
                }
            };

            if results.send(result).is_err() {
                tracing::debug!(index = job.index, "Result receiver closed");
            }
        });
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server responded with status {status}: {body}")]
    Status { status: u16, body: String },
}

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::recognition::{RecognizeRequest, RecognizeResponse};

/// POST /api/v1/recognize — run text recognition on one uploaded image.
///
/// Multipart fields: `batch_id`, `image_index`, `filename`, `image`.
/// Recognition failures come back as `200` with `success: false`.
pub async fn recognize_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<RecognizeResponse>, StatusCode> {
    let request = read_request(multipart).await?;

    if let Err(report) = request.validate() {
        tracing::warn!(
            filename = %request.filename,
            index = request.image_index,
            errors = %report,
            "Rejected invalid recognition request"
        );
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    Ok(Json(state.dispatcher.handle(request).await))
}

async fn read_request(mut multipart: Multipart) -> Result<RecognizeRequest, StatusCode> {
    let mut batch_id = None;
    let mut image_index = None;
    let mut filename = None;
    let mut image_data = None;

    while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "batch_id" => {
                let text = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                batch_id = Some(parse_number(&text)?);
            }
            "image_index" => {
                let text = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                image_index = Some(parse_number(&text)?);
            }
            "filename" => {
                filename = Some(field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?);
            }
            "image" => {
                let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                image_data = Some(data.to_vec());
            }
            _ => {}
        }
    }

    Ok(RecognizeRequest {
        batch_id: batch_id.ok_or(StatusCode::BAD_REQUEST)?,
        image_index: image_index.ok_or(StatusCode::BAD_REQUEST)?,
        filename: filename.ok_or(StatusCode::BAD_REQUEST)?,
        image_data: image_data.ok_or(StatusCode::BAD_REQUEST)?,
    })
}

fn parse_number<T: std::str::FromStr>(text: &str) -> Result<T, StatusCode> {
    text.trim().parse().map_err(|_| StatusCode::BAD_REQUEST)
}

use std::io;

use anyhow::anyhow;
use bytes::Bytes;
use futures_util::{Stream, stream};
use reqwest::Body;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::cli::UploadArgs;
use crate::client::{AppContext, CliError, CliResult, status_failure};

/// Size of each chunk read from disk and written to the request body.
pub(crate) const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

pub(crate) async fn handle_upload(ctx: &AppContext, args: UploadArgs) -> CliResult<String> {
    let file = File::open(&args.file).await.map_err(|err| {
        CliError::validation(format!("cannot open {}: {err}", args.file.display()))
    })?;

    let response = ctx
        .client
        .post(args.url.clone())
        .body(Body::wrap_stream(file_chunks(file, UPLOAD_CHUNK_SIZE)))
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("upload to {} failed: {err}", args.url)))?;

    if !response.status().is_success() {
        return Err(status_failure(response).await);
    }
    response
        .text()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to read upload response: {err}")))
}

fn file_chunks(file: File, chunk_size: usize) -> impl Stream<Item = io::Result<Bytes>> {
    stream::try_unfold(file, move |mut file| async move {
        let mut buffer = vec![0; chunk_size];
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            return Ok::<_, io::Error>(None);
        }
        buffer.truncate(read);
        Ok(Some((Bytes::from(buffer), file)))
    })
}

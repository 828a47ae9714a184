use anyhow::anyhow;
use futures_util::StreamExt;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::cli::DownloadArgs;
use crate::client::{AppContext, CliError, CliResult, status_failure};

/// Stream the archive for `args.identifier` into `args.output`, returning the bytes written.
///
/// A partially written file is removed when the stream breaks off.
pub(crate) async fn handle_download(ctx: &AppContext, args: DownloadArgs) -> CliResult<u64> {
    let identifier = args.identifier.trim();
    if identifier.is_empty() || identifier.contains('/') || identifier == "." || identifier == ".." {
        return Err(CliError::validation(format!(
            "identifier '{}' must be a single directory name",
            args.identifier
        )));
    }
    let url = args
        .base_url
        .join(&format!("archive/{identifier}/"))
        .map_err(|err| CliError::validation(format!("invalid base URL: {err}")))?;

    let response = ctx
        .client
        .get(url.clone())
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request to {url} failed: {err}")))?;
    if !response.status().is_success() {
        return Err(status_failure(response).await);
    }

    let mut file = File::create(&args.output).await.map_err(|err| {
        CliError::failure(anyhow!("cannot create {}: {err}", args.output.display()))
    })?;
    let mut body = response.bytes_stream();
    let mut written = 0_u64;
    while let Some(chunk) = body.next().await {
        let stored = match chunk {
            Ok(chunk) => file.write_all(&chunk).await.map(|()| chunk.len()),
            Err(err) => {
                drop(file);
                let _ = fs::remove_file(&args.output).await;
                return Err(CliError::failure(anyhow!(
                    "download interrupted after {written} bytes: {err}"
                )));
            }
        };
        match stored {
            Ok(len) => written += len as u64,
            Err(err) => {
                return Err(CliError::failure(anyhow!(
                    "cannot write {}: {err}",
                    args.output.display()
                )));
            }
        }
    }
    file.flush()
        .await
        .map_err(|err| CliError::failure(anyhow!("cannot flush {}: {err}", args.output.display())))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::Client;
    use std::path::PathBuf;

    fn context() -> AppContext {
        AppContext {
            client: Client::new(),
        }
    }

    #[tokio::test]
    async fn archive_is_written_to_disk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("archive.zip");
        let payload: Vec<u8> = (0..200_000_u32).map(|i| (i % 7) as u8).collect();

        let server = MockServer::start_async().await;
        let body = payload.clone();
        let mock = server
            .mock_async(move |when, then| {
                when.method(GET).path("/archive/7kna/");
                then.status(200)
                    .header("content-type", "multipart/x-mixed-replace")
                    .body(body);
            })
            .await;

        let written = handle_download(
            &context(),
            DownloadArgs {
                identifier: "7kna".to_string(),
                output: output.clone(),
                base_url: server.base_url().parse()?,
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;

        mock.assert_async().await;
        assert_eq!(written, payload.len() as u64);
        assert_eq!(std::fs::read(&output)?, payload);
        Ok(())
    }

    #[tokio::test]
    async fn missing_archive_reports_server_text() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("archive.zip");

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/archive/gone/");
                then.status(404)
                    .header("content-type", "text/plain; charset=utf-8")
                    .body("Архив не существует или был удален");
            })
            .await;

        let result = handle_download(
            &context(),
            DownloadArgs {
                identifier: "gone".to_string(),
                output: output.clone(),
                base_url: server.base_url().parse()?,
            },
        )
        .await;
        let Err(err) = result else {
            panic!("404 should fail");
        };
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("Архив не существует"));
        assert!(!output.exists());
        Ok(())
    }

    #[tokio::test]
    async fn nested_identifiers_are_rejected_before_any_request() -> anyhow::Result<()> {
        for identifier in ["", "a/b", "..", " "] {
            let result = handle_download(
                &context(),
                DownloadArgs {
                    identifier: identifier.to_string(),
                    output: PathBuf::from("unused.zip"),
                    base_url: "http://127.0.0.1:9".parse()?,
                },
            )
            .await;
            assert!(
                matches!(result, Err(CliError::Validation(_))),
                "{identifier:?} should be rejected"
            );
        }
        Ok(())
    }
}

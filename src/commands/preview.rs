//! Preview command handler: print the response a local file would get.

use std::path::Path;

use anyhow::{Context, Result};
use downloadview::{
    DownloadMiddleware, DownloadOptions, DownloadRequest, DownloadResponse, LocalFile, Response,
};
use http::HeaderMap;
use tracing::debug;

use super::load_middleware;

pub async fn run_preview_command(
    rules: &Path,
    file: &Path,
    basename: Option<String>,
    inline: bool,
) -> Result<()> {
    let (_config, middleware) = load_middleware(rules)?;

    let local = LocalFile::open(file)
        .await
        .with_context(|| format!("cannot serve {}", file.display()))?;
    let options = DownloadOptions {
        attachment: !inline,
        basename,
        ..DownloadOptions::default()
    };
    let download = DownloadResponse::new(Box::new(local), options);

    let request = DownloadRequest::default();
    let response = middleware
        .process_response(&request, Response::Download(download))
        .await
        .context("middleware failed")?;

    match response {
        Response::Download(mut download) => {
            debug!("no rule matched, the application streams the file");
            println!("status = {}", download.status().as_u16());
            println!("served_by = application");
            let headers = download.default_headers().await?;
            print_headers(headers);
        }
        Response::Proxied(proxied) => {
            println!("status = {}", proxied.status().as_u16());
            println!("served_by = {}", proxied.backend());
            print_headers(proxied.headers());
        }
        Response::Http(response) => {
            println!("status = {}", response.status().as_u16());
            print_headers(response.headers());
        }
    }
    Ok(())
}

fn print_headers(headers: &HeaderMap) {
    for (name, value) in headers {
        println!("{name}: {}", String::from_utf8_lossy(value.as_bytes()));
    }
}

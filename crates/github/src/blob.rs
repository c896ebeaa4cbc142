//! Transfers to and from signed blob storage URLs.
//!
//! Uploads are staged as blocks (`comp=block`) and committed with a block
//! list (`comp=blocklist`) so files of any size stream in bounded memory.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use qodana_ci_core::{Error, Result};
use reqwest::Client;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

const BLOCK_SIZE: usize = 32 * 1024 * 1024;

/// Block ids must all have the same length within a blob.
fn block_id(index: usize) -> String {
    STANDARD.encode(format!("block-{index:08}"))
}

fn block_list(ids: &[String]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?><BlockList>"#);
    for id in ids {
        xml.push_str("<Latest>");
        xml.push_str(id);
        xml.push_str("</Latest>");
    }
    xml.push_str("</BlockList>");
    xml
}

async fn read_full(file: &mut tokio::fs::File, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = file.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn check(label: &'static str, what: &str, response: &reqwest::Response) -> Result<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(Error::host(
            label,
            format!("{what} failed: HTTP {}", response.status()),
        ))
    }
}

/// Upload `file` to `signed_url`, returning the number of bytes sent.
pub(crate) async fn upload(
    client: &Client,
    label: &'static str,
    signed_url: &str,
    file: &Path,
) -> Result<u64> {
    let mut source = tokio::fs::File::open(file).await?;
    let mut buffer = vec![0u8; BLOCK_SIZE];
    let mut ids = Vec::new();
    let mut size: u64 = 0;

    loop {
        let n = read_full(&mut source, &mut buffer).await?;
        if n == 0 {
            break;
        }
        let id = block_id(ids.len());
        debug!(block = ids.len(), bytes = n, "Uploading block");
        let response = client
            .put(signed_url)
            .query(&[("comp", "block"), ("blockid", id.as_str())])
            .body(buffer[..n].to_vec())
            .send()
            .await
            .map_err(|e| Error::host(label, e.to_string()))?;
        check(label, "Block upload", &response)?;
        ids.push(id);
        size += n as u64;
    }

    let response = client
        .put(signed_url)
        .query(&[("comp", "blocklist")])
        .header(reqwest::header::CONTENT_TYPE, "application/xml")
        .body(block_list(&ids))
        .send()
        .await
        .map_err(|e| Error::host(label, e.to_string()))?;
    check(label, "Block list commit", &response)?;
    Ok(size)
}

/// Stream `url` into `dest`.
pub(crate) async fn download(client: &Client, label: &'static str, url: &str, dest: &Path) -> Result<()> {
    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::host(label, e.to_string()))?;
    check(label, "Download", &response)?;

    let mut file = tokio::fs::File::create(dest).await?;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| Error::host(label, e.to_string()))?
    {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

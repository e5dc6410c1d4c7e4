//! Response body adapters

use crate::gateway::transport_error;
use ferry_core::DownloadStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::Response;

/// Wrap a response body as a [`DownloadStream`], carrying over
/// `Content-Length`, `Content-Type` and an attachment filename when present
pub fn download_stream(response: Response) -> DownloadStream {
    let size = response.content_length();
    let content_type = header_str(&response, CONTENT_TYPE).map(str::to_string);
    let name = header_str(&response, CONTENT_DISPOSITION).and_then(attachment_filename);

    let body = response.bytes_stream().map_err(transport_error).boxed();
    let mut stream = DownloadStream::new(body);
    if let Some(size) = size {
        stream = stream.with_size(size);
    }
    if let Some(content_type) = content_type {
        stream = stream.with_content_type(content_type);
    }
    if let Some(name) = name {
        stream = stream.with_name(name);
    }
    stream
}

fn header_str(response: &Response, name: reqwest::header::HeaderName) -> Option<&str> {
    response.headers().get(name).and_then(|value| value.to_str().ok())
}

fn attachment_filename(disposition: &str) -> Option<String> {
    disposition
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_filename() {
        assert_eq!(
            attachment_filename("attachment; filename=\"report.pdf\"").as_deref(),
            Some("report.pdf")
        );
        assert_eq!(attachment_filename("attachment; filename=a.txt").as_deref(), Some("a.txt"));
        assert_eq!(attachment_filename("inline"), None);
        assert_eq!(attachment_filename("attachment; filename=\"\""), None);
    }
}

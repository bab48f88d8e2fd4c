//! Protocol-specific decomposition of the text after a server prefix.

use crate::error::{Result, UdaError};
use crate::request::RequestDescriptor;
use crate::strings::{is_number, reverse};

const SSL_SCHEME: &str = "SSL://";

/// Split an MDS+ source `[server/path/]tree/number` from the tail.
///
/// A trailing number is the tree number, the element before it the tree
/// name and everything in front the server (a leading `/` is kept only
/// when the input had one). Without a trailing number the whole text is
/// the server.
///
/// # Errors
///
/// Returns `AmbiguousMdsPath` when a tree number has no tree name.
pub fn decompose_mds(text: &str, request: &mut RequestDescriptor) -> Result<()> {
    let reversed = reverse(text);
    let mut tokens = reversed.split('/').filter(|t| !t.is_empty());

    let Some(first) = tokens.next() else {
        request.server.clear();
        return Ok(());
    };

    let number = reverse(first);
    if !is_number(&number) {
        request.server = text.to_string();
        return Ok(());
    }

    let (Ok(exp_number), Some(tree)) = (number.parse::<i32>(), tokens.next()) else {
        return Err(UdaError::AmbiguousMdsPath(format!(
            "'{}' does not comply with the naming models server/tree/number or server/path/to/data/tree/number",
            text
        )));
    };

    request.exp_number = exp_number;
    request.file = reverse(tree);

    let mut elements: Vec<String> = tokens.map(reverse).collect();
    elements.reverse();
    let server = elements.join("/");
    request.server = if text.starts_with('/') && !server.is_empty() {
        format!("/{}", server)
    } else {
        server
    };

    tracing::debug!(server = %request.server, tree = %request.file, number = exp_number, "MDS+ source");
    Ok(())
}

/// Split a remote server source `host[:port]/rest` (or
/// `SSL://host[:port]/rest`) into `server` and `file`.
pub fn decompose_server_url(text: &str, request: &mut RequestDescriptor) {
    request.server = text.to_string();

    if let Some(scheme) = text.find(SSL_SCHEME) {
        let url = &text[scheme..];
        if let Some(slash) = url[SSL_SCHEME.len()..].find('/') {
            let split = SSL_SCHEME.len() + slash;
            request.server = url[..split].to_string();
            request.file = url[split + 1..].to_string();
        }
    } else if let Some(slash) = text.find('/') {
        request.server = text[..slash].to_string();
        request.file = text[slash + 1..].to_string();
    }

    tracing::debug!(server = %request.server, file = %request.file, "server source");
}

/// Split an SQL `path` of the form `server/path` into `server` and `path`.
pub fn decompose_sql(request: &mut RequestDescriptor) {
    let path = std::mem::take(&mut request.path);
    match path.split_once('/') {
        Some((server, rest)) => {
            request.server = server.to_string();
            request.path = rest.to_string();
        }
        None => request.server = path,
    }
}

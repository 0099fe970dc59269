//! Pure predicates over message metadata (spec §4.5, component C5).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{CheckRequest, CheckResponse};

static URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+").expect("static URL regex is valid"));

fn count_links(request: &CheckRequest) -> u32 {
    if request.meta.links > 0 {
        request.meta.links
    } else {
        URL_REGEX.find_iter(&request.msg).count() as u32
    }
}

/// Spam iff the message contains more links than `limit`.
pub fn links(request: &CheckRequest, limit: u32) -> CheckResponse {
    let count = count_links(request);
    if count > limit {
        CheckResponse::spam("links", format!("too many links {}/{}", count, limit))
    } else {
        CheckResponse::ham("links", format!("links {}/{}", count, limit))
    }
}

/// Spam iff, after trimming whitespace and removing every URL span, nothing
/// of substance is left but the original message was not itself empty.
pub fn link_only(request: &CheckRequest) -> CheckResponse {
    let trimmed = request.msg.trim();
    if trimmed.is_empty() {
        return CheckResponse::ham("link-only", "empty message");
    }

    let residue = URL_REGEX.replace_all(trimmed, "");
    if residue.trim().is_empty() {
        CheckResponse::spam("link-only", "message contains links only")
    } else {
        CheckResponse::ham("link-only", "message contains text")
    }
}

/// Spam iff an image was attached without any accompanying text.
pub fn images(request: &CheckRequest) -> CheckResponse {
    if request.meta.images > 0 && request.msg.is_empty() {
        CheckResponse::spam("images", "image without text")
    } else {
        CheckResponse::ham("images", "text or no images")
    }
}

/// Spam iff a video was attached without any accompanying text.
pub fn videos(request: &CheckRequest) -> CheckResponse {
    if request.meta.has_video && request.msg.is_empty() {
        CheckResponse::spam("videos", "video without text")
    } else {
        CheckResponse::ham("videos", "text or no video")
    }
}

/// Spam iff audio was attached without any accompanying text.
pub fn audio(request: &CheckRequest) -> CheckResponse {
    if request.meta.has_audio && request.msg.is_empty() {
        CheckResponse::spam("audio", "audio without text")
    } else {
        CheckResponse::ham("audio", "text or no audio")
    }
}

/// Spam iff the message is a forward.
pub fn forward(request: &CheckRequest) -> CheckResponse {
    if request.meta.has_forward {
        CheckResponse::spam("forward", "message is forwarded")
    } else {
        CheckResponse::ham("forward", "message is not forwarded")
    }
}

/// Spam iff the message carries an inline keyboard.
pub fn keyboard(request: &CheckRequest) -> CheckResponse {
    if request.meta.has_keyboard {
        CheckResponse::spam("keyboard", "message has a keyboard attached")
    } else {
        CheckResponse::ham("keyboard", "message has no keyboard")
    }
}

/// Disabled when `limit < 0`; otherwise spam iff `meta.mentions > limit`.
pub fn mentions(request: &CheckRequest, limit: i32) -> CheckResponse {
    if limit < 0 {
        return CheckResponse::ham("mentions", "check disabled");
    }

    let limit = limit as u32;
    if request.meta.mentions > limit {
        CheckResponse::spam(
            "mentions",
            format!("too many mentions {}/{}", request.meta.mentions, limit),
        )
    } else {
        CheckResponse::ham(
            "mentions",
            format!("mentions {}/{}", request.meta.mentions, limit),
        )
    }
}

/// Disabled when `symbols` is empty; otherwise spam iff any character of the
/// username is in `symbols`.
pub fn username_symbols(request: &CheckRequest, symbols: &[char]) -> CheckResponse {
    if symbols.is_empty() {
        return CheckResponse::ham("username-symbols", "check disabled");
    }

    match request.user_name.chars().find(|c| symbols.contains(c)) {
        Some(found) => CheckResponse::spam(
            "username-symbols",
            format!("username contains symbol `{}`", found),
        ),
        None => CheckResponse::ham("username-symbols", "username contains no denied symbols"),
    }
}

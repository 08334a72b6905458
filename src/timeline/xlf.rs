//! Layout file duration extraction
//!
//! The only markup parsing the core does: pull a playback duration out of
//! a cached XLF layout document. An explicit `duration` attribute on the
//! `<layout>` root wins; otherwise the duration is the maximum across
//! regions of the summed media durations, where a video with
//! `useDuration="0"` counts as a 60-second placeholder until the renderer
//! reports its real length.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Placeholder for media whose real duration is unknown until first play.
pub const PLACEHOLDER_DURATION_SECS: u32 = 60;

/// Layout file parsing failure.
#[derive(Error, Debug)]
pub enum XlfError {
    /// The document is not well-formed XML
    #[error("malformed layout XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The root element is not `<layout>`
    #[error("document root is not a layout")]
    NotALayout,
}

/// Extract the playback duration (seconds) from an XLF document.
///
/// Returns 0 when the document declares nothing; callers substitute the
/// placeholder.
pub fn parse_layout_duration(xml: &str) -> Result<u32, XlfError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut state = ParseState::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if let Some(explicit) = state.open(&e)? {
                    return Ok(explicit);
                }
            }
            Event::Empty(e) => {
                if let Some(explicit) = state.open(&e)? {
                    return Ok(explicit);
                }
                // a self-closing element closes immediately
                state.close(e.name().as_ref());
            }
            Event::End(e) => state.close(e.name().as_ref()),
            Event::Eof => break,
            _ => {}
        }
    }

    if !state.saw_root {
        return Err(XlfError::NotALayout);
    }

    Ok(state.max_region)
}

#[derive(Default)]
struct ParseState {
    saw_root: bool,
    in_region: bool,
    region_total: u32,
    max_region: u32,
}

impl ParseState {
    /// Handle an opening tag; returns an explicit layout duration when the
    /// root declares one.
    fn open(&mut self, e: &BytesStart<'_>) -> Result<Option<u32>, XlfError> {
        let name = e.name();
        let name = name.as_ref();

        if !self.saw_root {
            if name != b"layout" {
                return Err(XlfError::NotALayout);
            }
            self.saw_root = true;
            if let Some(explicit) = attr_u32(e, b"duration") {
                if explicit > 0 {
                    return Ok(Some(explicit));
                }
            }
            return Ok(None);
        }

        match name {
            b"region" => {
                self.in_region = true;
                self.region_total = 0;
            }
            b"media" if self.in_region => {
                self.region_total = self.region_total.saturating_add(media_duration(e));
            }
            _ => {}
        }
        Ok(None)
    }

    fn close(&mut self, name: &[u8]) {
        if name == b"region" {
            self.max_region = self.max_region.max(self.region_total);
            self.in_region = false;
        }
    }
}

fn media_duration(e: &BytesStart<'_>) -> u32 {
    let media_type = attr_string(e, b"type");
    let use_duration = attr_string(e, b"useDuration");

    if media_type.as_deref() == Some("video") && use_duration.as_deref() == Some("0") {
        return PLACEHOLDER_DURATION_SECS;
    }

    attr_u32(e, b"duration").unwrap_or(0)
}

fn attr_string(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

fn attr_u32(e: &BytesStart<'_>, key: &[u8]) -> Option<u32> {
    attr_string(e, key).and_then(|v| v.trim().parse::<u32>().ok())
}

//! Media inventory reporting
//!
//! After each manifest fetch the player tells the CMS what it holds:
//! every required file with a completeness flag, so the CMS dashboard can
//! show download progress per display. The report is the
//! `<files><file … /></files>` document the CMS expects.

use std::collections::HashSet;
use std::io::Cursor;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::models::{FileType, RequiredFile};

use super::PlayerCore;

/// Render the inventory document for a manifest.
///
/// `ready` holds the ids the cache has confirmed on disk.
pub fn build_inventory(
    files: &[RequiredFile],
    ready: &HashSet<String>,
    checked_at: DateTime<Utc>,
) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer
        .write_event(Event::Start(BytesStart::new("files")))
        .context("writing inventory root")?;

    let last_checked = checked_at.timestamp().to_string();
    for file in files {
        let complete = if ready.contains(&file.id) { "1" } else { "0" };
        let mut el = BytesStart::new("file");
        el.push_attribute(("type", type_name(file.file_type)));
        el.push_attribute(("id", file.id.as_str()));
        el.push_attribute(("complete", complete));
        el.push_attribute(("md5", file.md5.as_str()));
        el.push_attribute(("lastChecked", last_checked.as_str()));
        if file.file_type == FileType::Dependency || file.file_type == FileType::Widget {
            el.push_attribute(("fileType", type_name(file.file_type)));
        }
        writer
            .write_event(Event::Empty(el))
            .context("writing inventory entry")?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("files")))
        .context("closing inventory root")?;

    String::from_utf8(writer.into_inner().into_inner()).context("inventory is not utf-8")
}

fn type_name(file_type: FileType) -> &'static str {
    match file_type {
        FileType::Media => "media",
        FileType::Layout => "layout",
        FileType::Resource => "resource",
        FileType::Dependency => "dependency",
        FileType::Widget => "widget",
    }
}

impl PlayerCore {
    /// Submit the inventory for the current manifest; failures are warned
    /// about and swallowed.
    pub(crate) async fn submit_media_inventory(&self) {
        let Some(manifest) = &self.required_files else {
            return;
        };

        let xml = match build_inventory(&manifest.files, &self.media_ready, self.clock.now()) {
            Ok(xml) => xml,
            Err(e) => {
                tracing::warn!(error = %e, "could not build media inventory");
                return;
            }
        };

        if let Err(e) = self.transport.media_inventory(&xml).await {
            tracing::warn!(error = %e, "media inventory submission failed");
        }
    }
}

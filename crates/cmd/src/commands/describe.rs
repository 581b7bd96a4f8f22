// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use diagnostics::*;
use std::fmt::Write;
use upload::{Upload, UploadConfig};
use votstream::{BuilderRegistry, StreamingTableIterator, TableIterator, TableMetadata};

/// Describe command - shows the resolved columns of each uploaded document
///
/// Only the document header is read; the producer is cancelled as soon as
/// the metadata is known.
pub fn describe_command<F>(config: &UploadConfig, uploads: &[Upload], mut handler: F) -> Result<()>
where
    F: FnMut(&str),
{
    let registry = BuilderRegistry::with_defaults();

    for upload in uploads {
        let label = upload.label.as_str();
        debug!("describe_command reading {label}", label: label);

        let input = upload
            .open()
            .with_context(|| format!("Failed to open upload {label}"))?;
        let mut it = StreamingTableIterator::open(
            &config.format,
            input,
            &registry,
            config.iterator_options(),
        )
        .with_context(|| format!("Failed to start reading upload {label}"))?;

        let metadata = it
            .metadata()
            .with_context(|| format!("Failed to read the columns of upload {label}"))?;
        it.close();

        handler(&format_metadata(label, &metadata));
    }
    Ok(())
}

fn format_metadata(label: &str, metadata: &TableMetadata) -> String {
    let mut output = String::new();
    _ = writeln!(output, "{label} ({} columns)", metadata.len());

    let width = metadata.iter().map(|c| c.name.len()).max().unwrap_or(0);
    for column in metadata.iter() {
        let mut line = format!("  {:width$}  {}", column.name, column.datatype);
        if let Some(unit) = &column.unit {
            _ = write!(line, "  [{unit}]");
        }
        if let Some(ucd) = &column.ucd {
            _ = write!(line, "  {ucd}");
        }
        if let Some(description) = &column.description {
            _ = write!(line, "  {description}");
        }
        output.push_str(line.trim_end());
        output.push('\n');
    }
    output
}

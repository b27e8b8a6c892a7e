//! The closed set of operations and their dispatcher

use std::time::Instant;

use serde::Deserialize;
use tracing::info;

use crate::annotate::{annotate_pages, validate_annotations, PageAnnotations};
use crate::cancel::CancelToken;
use crate::compress::{compress_document, CompressionLevel};
use crate::document::PdfHandle;
use crate::error::PdfToolsError;
use crate::inspect::{analyze, pdf_info, repair, AnalysisReport, PdfInfo};
use crate::merge::merge_documents;
use crate::organize::{organize_pages, validate_operations, OrganizeOperation};
use crate::page_numbers::{add_page_numbers, PageNumberOptions};
use crate::ranges::PageSpec;
use crate::result::ProcessResult;
use crate::rotate::{rotate_pages, RotateOptions};
use crate::split::{split_document, split_every_page};
use crate::watermark::{add_watermark, WatermarkOptions};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum PdfCommand {
    Merge {
        files: Vec<Vec<u8>>,
    },
    Split {
        file: Vec<u8>,
        /// One output per page when absent
        #[serde(default)]
        ranges: Option<PageSpec>,
    },
    Compress {
        file: Vec<u8>,
        #[serde(default)]
        level: CompressionLevel,
    },
    Rotate {
        file: Vec<u8>,
        #[serde(flatten)]
        options: RotateOptions,
    },
    Watermark {
        file: Vec<u8>,
        #[serde(flatten)]
        options: WatermarkOptions,
    },
    PageNumbers {
        file: Vec<u8>,
        #[serde(flatten)]
        options: PageNumberOptions,
    },
    Organize {
        file: Vec<u8>,
        operations: Vec<OrganizeOperation>,
    },
    Analyze {
        file: Vec<u8>,
    },
    Repair {
        file: Vec<u8>,
    },
    Annotate {
        file: Vec<u8>,
        annotations: PageAnnotations,
    },
    Info {
        file: Vec<u8>,
    },
    /// Password protection; always refused
    Protect {
        file: Vec<u8>,
        #[serde(default)]
        password: String,
    },
    /// Password removal; always refused
    Unlock {
        file: Vec<u8>,
        #[serde(default)]
        password: String,
    },
}

/// What a command produced
#[derive(Debug, Clone)]
pub enum CommandOutput {
    Document(ProcessResult),
    Documents(Vec<ProcessResult>),
    Analysis(AnalysisReport),
    Info(PdfInfo),
}

impl PdfCommand {
    /// Operation name as used on the wire and in output file names
    pub fn name(&self) -> &'static str {
        match self {
            PdfCommand::Merge { .. } => "merge",
            PdfCommand::Split { .. } => "split",
            PdfCommand::Compress { .. } => "compress",
            PdfCommand::Rotate { .. } => "rotate",
            PdfCommand::Watermark { .. } => "watermark",
            PdfCommand::PageNumbers { .. } => "page-numbers",
            PdfCommand::Organize { .. } => "organize",
            PdfCommand::Analyze { .. } => "analyze",
            PdfCommand::Repair { .. } => "repair",
            PdfCommand::Annotate { .. } => "annotate",
            PdfCommand::Info { .. } => "info",
            PdfCommand::Protect { .. } => "protect",
            PdfCommand::Unlock { .. } => "unlock",
        }
    }

    /// Total size of the input documents
    pub fn input_size(&self) -> usize {
        match self {
            PdfCommand::Merge { files } => files.iter().map(Vec::len).sum(),
            PdfCommand::Split { file, .. }
            | PdfCommand::Compress { file, .. }
            | PdfCommand::Rotate { file, .. }
            | PdfCommand::Watermark { file, .. }
            | PdfCommand::PageNumbers { file, .. }
            | PdfCommand::Organize { file, .. }
            | PdfCommand::Analyze { file }
            | PdfCommand::Repair { file }
            | PdfCommand::Annotate { file, .. }
            | PdfCommand::Info { file }
            | PdfCommand::Protect { file, .. }
            | PdfCommand::Unlock { file, .. } => file.len(),
        }
    }

    /// Parameter checks that need no document
    pub fn validate(&self) -> Result<(), PdfToolsError> {
        match self {
            PdfCommand::Merge { files } if files.len() < 2 => Err(PdfToolsError::Validation(
                "At least 2 PDF files are required for merging".into(),
            )),
            PdfCommand::Rotate { options, .. } => options.validate(),
            PdfCommand::Watermark { options, .. } => options.validate(),
            PdfCommand::PageNumbers { options, .. } => options.validate(),
            PdfCommand::Organize { operations, .. } => validate_operations(operations),
            PdfCommand::Annotate { annotations, .. } => validate_annotations(annotations),
            _ => Ok(()),
        }
    }
}

fn load(file: &[u8]) -> Result<PdfHandle, PdfToolsError> {
    PdfHandle::load(file)
}

/// Validate and run `command`.
///
/// Failures of the command as a whole come back as `Err`. Split is the one
/// operation with per-output failures; those are error envelopes inside
/// [`CommandOutput::Documents`].
pub fn execute(command: PdfCommand, cancel: &CancelToken) -> Result<CommandOutput, PdfToolsError> {
    command.validate()?;

    let started = Instant::now();
    let input_size = command.input_size();
    let name = command.name();
    info!("Executing {} ({} input bytes)", name, input_size);

    let single = |output| ProcessResult::from_outcome(Ok(output), input_size, started);

    let output = match command {
        PdfCommand::Merge { files } => {
            CommandOutput::Document(single(merge_documents(&files, cancel)?))
        }
        PdfCommand::Split { file, ranges } => {
            let source = load(&file)?;
            let parts = match ranges {
                Some(spec) => split_document(&source, &spec, cancel)?,
                None => split_every_page(&source, cancel)?,
            };
            CommandOutput::Documents(
                parts
                    .into_iter()
                    .map(|part| {
                        ProcessResult::from_outcome(part.result, input_size, started)
                            .with_range(part.label)
                    })
                    .collect(),
            )
        }
        PdfCommand::Compress { file, level } => CommandOutput::Document(single(
            compress_document(load(&file)?, level, file.len())?,
        )),
        PdfCommand::Rotate { file, options } => {
            CommandOutput::Document(single(rotate_pages(load(&file)?, &options, cancel)?))
        }
        PdfCommand::Watermark { file, options } => {
            CommandOutput::Document(single(add_watermark(load(&file)?, &options, cancel)?))
        }
        PdfCommand::PageNumbers { file, options } => {
            CommandOutput::Document(single(add_page_numbers(load(&file)?, &options, cancel)?))
        }
        PdfCommand::Organize { file, operations } => {
            CommandOutput::Document(single(organize_pages(&load(&file)?, &operations, cancel)?))
        }
        PdfCommand::Analyze { file } => CommandOutput::Analysis(analyze(&file)),
        PdfCommand::Repair { file } => CommandOutput::Document(single(repair(&file)?)),
        PdfCommand::Annotate { file, annotations } => {
            CommandOutput::Document(single(annotate_pages(load(&file)?, &annotations, cancel)?))
        }
        PdfCommand::Info { file } => CommandOutput::Info(pdf_info(&file)?),
        PdfCommand::Protect { .. } => {
            return Err(PdfToolsError::Unsupported(
                "password protection is not available".into(),
            ))
        }
        PdfCommand::Unlock { .. } => {
            return Err(PdfToolsError::Unsupported(
                "removing PDF passwords is not available".into(),
            ))
        }
    };

    info!(
        "{} finished in {} ms",
        name,
        started.elapsed().as_millis()
    );
    Ok(output)
}

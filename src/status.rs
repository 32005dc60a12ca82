//! Human-readable status log for one processing run.
//!
//! Every entry is also emitted as an `info!` event and handed to
//! [`ProgressCallback::on_status`] as it is written, so a run that fails
//! halfway still leaves its log with the caller.

use crate::config::Language;
use crate::error::Ocr2MdError;
use crate::progress::ProgressCallback;
use std::path::Path;
use tracing::info;

/// Accumulates status lines in the configured language.
pub(crate) struct StatusLog<'a> {
    lang: Language,
    lines: Vec<String>,
    sink: &'a dyn ProgressCallback,
}

impl<'a> StatusLog<'a> {
    pub(crate) fn new(lang: Language, sink: &'a dyn ProgressCallback) -> Self {
        Self {
            lang,
            lines: Vec::new(),
            sink,
        }
    }

    fn push(&mut self, line: String) {
        info!("{line}");
        self.sink.on_status(&line);
        self.lines.push(line);
    }

    pub(crate) fn file_detected(&mut self, filename: &str) {
        let line = match self.lang {
            Language::En => format!("File detected: {filename}"),
            Language::Zh => format!("检测到文件: {filename}"),
        };
        self.push(line);
    }

    pub(crate) fn pdf_detected(&mut self) {
        let line = match self.lang {
            Language::En => "PDF file detected, starting conversion...",
            Language::Zh => "检测到PDF文件，开始转换...",
        };
        self.push(line.to_string());
    }

    pub(crate) fn pdf_converted(&mut self, page_count: usize) {
        let line = match self.lang {
            Language::En => format!("PDF conversion completed, total {page_count} pages"),
            Language::Zh => format!("PDF转换完成，共 {page_count} 页"),
        };
        self.push(line);
    }

    pub(crate) fn page_processed(&mut self, page_num: usize) {
        let line = match self.lang {
            Language::En => format!("Page {page_num} processed"),
            Language::Zh => format!("第 {page_num} 页处理完成"),
        };
        self.push(line);
    }

    pub(crate) fn image_detected(&mut self) {
        let line = match self.lang {
            Language::En => "Image file detected, starting processing...",
            Language::Zh => "检测到图片文件，开始处理...",
        };
        self.push(line.to_string());
    }

    pub(crate) fn image_processed(&mut self) {
        let line = match self.lang {
            Language::En => "Image processing completed",
            Language::Zh => "图片处理完成",
        };
        self.push(line.to_string());
    }

    pub(crate) fn ocr_completed(&mut self, output: &Path) {
        let line = match self.lang {
            Language::En => format!(
                "OCR processing completed! Results saved to: {}",
                output.display()
            ),
            Language::Zh => format!("OCR处理完成! 结果保存在: {}", output.display()),
        };
        self.push(line);
    }

    pub(crate) fn processing_error(&mut self, error: &Ocr2MdError) {
        let line = match self.lang {
            Language::En => format!("Error occurred during processing: {error}"),
            Language::Zh => format!("处理过程中发生错误: {error}"),
        };
        self.push(line);
    }

    pub(crate) fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

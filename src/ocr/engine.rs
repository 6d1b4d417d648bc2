use anyhow::{Result, anyhow};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::TesseractPaths;
use crate::matching::text::is_cjk;

/// Represents a line of OCR text with confidence score
#[derive(Debug, Clone, PartialEq)]
pub struct OcrLine {
    pub text: String,
    pub words: Vec<OcrWord>,
    pub confidence: f32,
}

/// Represents a single word from OCR with confidence score and box size
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
    pub width: u32,
    pub height: u32,
}

/// A Tesseract invocation profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeProfile {
    pub name: String,
    /// Page segmentation mode (`--psm`).
    pub psm: u8,
    /// Engine mode (`--oem`).
    pub oem: u8,
    /// Run the binarize/upscale pipeline before recognition.
    pub preprocess: bool,
    /// Extra `-c name=value` settings.
    #[serde(default)]
    pub variables: Vec<String>,
}

impl ModeProfile {
    /// Sparse text, LSTM engine, on the unmodified capture.
    pub fn raw() -> Self {
        Self {
            name: "raw".to_string(),
            psm: 11,
            oem: 1,
            preprocess: false,
            variables: vec!["preserve_interword_spaces=1".to_string()],
        }
    }

    /// Single uniform block, default engine, on the binarized and upscaled capture.
    pub fn enhanced() -> Self {
        Self {
            name: "enhanced".to_string(),
            psm: 6,
            oem: 3,
            preprocess: true,
            variables: vec!["preserve_interword_spaces=1".to_string()],
        }
    }
}

/// Something that turns pixels into text lines.
pub trait OcrBackend: Send + Sync {
    fn recognize(
        &self,
        image: &DynamicImage,
        language: &str,
        profile: &ModeProfile,
    ) -> Result<Vec<OcrLine>>;
}

/// Runs the Tesseract command-line tool.
pub struct TesseractBackend {
    executable: PathBuf,
    tessdata: PathBuf,
}

impl TesseractBackend {
    pub fn new(paths: TesseractPaths) -> Self {
        Self {
            executable: paths.executable,
            tessdata: paths.tessdata,
        }
    }
}

impl OcrBackend for TesseractBackend {
    fn recognize(
        &self,
        image: &DynamicImage,
        language: &str,
        profile: &ModeProfile,
    ) -> Result<Vec<OcrLine>> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        image.save(temp_input.path())?;

        // Create temporary output file (Tesseract adds .tsv extension)
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let mut command = Command::new(&self.executable);
        command
            .arg(temp_input.path())
            .arg(&output_base)
            .arg("--tessdata-dir")
            .arg(&self.tessdata)
            .arg("-l")
            .arg(language)
            .arg("--psm")
            .arg(profile.psm.to_string())
            .arg("--oem")
            .arg(profile.oem.to_string());
        for variable in &profile.variables {
            command.arg("-c").arg(variable);
        }
        // Output TSV format for per-word boxes
        let output = command.arg("tsv").output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;

        let _ = std::fs::remove_file(&tsv_path);

        parse_tsv_output(&tsv_content)
    }
}

/// Parses Tesseract TSV output into structured OcrLine data.
///
/// Words are grouped by (block, paragraph, line) since sparse-text mode puts
/// nearly every word in its own block.
pub fn parse_tsv_output(tsv: &str) -> Result<Vec<OcrLine>> {
    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current_key: Option<(i32, i32, i32)> = None;
    let mut current_words: Vec<OcrWord> = Vec::new();

    for line in tsv.lines().skip(1) {
        // Skip header
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let level: i32 = fields[0].parse().unwrap_or(-1);
        let key = (
            fields[2].parse().unwrap_or(-1),
            fields[3].parse().unwrap_or(-1),
            fields[4].parse().unwrap_or(-1),
        );
        let width: u32 = fields[8].parse().unwrap_or(0);
        let height: u32 = fields[9].parse().unwrap_or(0);
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        let text = fields[11].trim();

        // Level 5 = word
        if level != 5 || text.is_empty() {
            continue;
        }

        if current_key.is_some_and(|k| k != key) {
            flush_line(&mut lines, std::mem::take(&mut current_words));
        }
        current_key = Some(key);

        if conf >= 0.0 {
            current_words.push(OcrWord {
                text: text.to_string(),
                confidence: conf,
                width,
                height,
            });
        }
    }

    // Don't forget the last line
    flush_line(&mut lines, current_words);

    Ok(lines)
}

fn flush_line(lines: &mut Vec<OcrLine>, words: Vec<OcrWord>) {
    if words.is_empty() {
        return;
    }
    let confidence = words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32;
    lines.push(OcrLine {
        text: join_words(&words),
        words,
        confidence,
    });
}

/// Joins words with spaces, except between two CJK glyphs where the space is
/// an artifact of per-character segmentation.
fn join_words(words: &[OcrWord]) -> String {
    let mut text = String::new();
    for word in words {
        let glue = match (text.chars().last(), word.text.chars().next()) {
            (None, _) => false,
            (Some(prev), Some(next)) => !(is_cjk(prev) && is_cjk(next)),
            _ => true,
        };
        if glue {
            text.push(' ');
        }
        text.push_str(&word.text);
    }
    text
}

/// Joins recognized lines into a single newline-separated string.
pub fn lines_to_text(lines: &[OcrLine]) -> String {
    lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn row(block: i32, line: i32, word: i32, height: u32, conf: f32, text: &str) -> String {
        format!("5\t1\t{block}\t1\t{line}\t{word}\t0\t0\t20\t{height}\t{conf}\t{text}")
    }

    #[test]
    fn test_parse_groups_by_block_and_line() {
        let tsv = [
            HEADER.to_string(),
            "1\t1\t0\t0\t0\t0\t0\t0\t100\t100\t-1\t".to_string(),
            row(1, 1, 1, 30, 91.0, "幽灵"),
            row(1, 1, 2, 30, 89.0, "船长"),
            row(2, 1, 1, 12, 70.0, "Lv"),
            row(2, 1, 2, 12, 60.0, "3"),
        ]
        .join("\n");

        let lines = parse_tsv_output(&tsv).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "幽灵船长");
        assert_eq!(lines[0].words[0].height, 30);
        assert_eq!(lines[0].confidence, 90.0);
        assert_eq!(lines[1].text, "Lv 3");
    }

    #[test]
    fn test_parse_skips_negative_confidence_and_blank_words() {
        let tsv = [
            HEADER.to_string(),
            row(1, 1, 1, 10, -1.0, "x"),
            row(1, 1, 2, 10, 50.0, " "),
            row(1, 1, 3, 10, 50.0, "ok"),
        ]
        .join("\n");

        let lines = parse_tsv_output(&tsv).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].words.len(), 1);
        assert_eq!(lines[0].text, "ok");
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_tsv_output(HEADER).unwrap().is_empty());
        assert!(parse_tsv_output("").unwrap().is_empty());
    }

    #[test]
    fn test_lines_to_text() {
        let tsv = [HEADER.to_string(), row(1, 1, 1, 10, 90.0, "狼"), row(1, 2, 1, 10, 90.0, "人杀")]
            .join("\n");
        let lines = parse_tsv_output(&tsv).unwrap();
        assert_eq!(lines_to_text(&lines), "狼\n人杀");
    }

    #[test]
    fn test_profiles_differ() {
        assert_ne!(ModeProfile::raw(), ModeProfile::enhanced());
        assert!(!ModeProfile::raw().preprocess);
        assert!(ModeProfile::enhanced().preprocess);
    }
}

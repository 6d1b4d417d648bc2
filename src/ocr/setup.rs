use anyhow::{Context, Result, anyhow};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::config::OcrConfig;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata_best/raw/main";

#[cfg(windows)]
const TESSERACT_EXE: &str = "tesseract.exe";
#[cfg(not(windows))]
const TESSERACT_EXE: &str = "tesseract";

#[cfg(windows)]
const COMMON_INSTALL_DIRS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR",
    r"C:\Program Files (x86)\Tesseract-OCR",
];
#[cfg(not(windows))]
const COMMON_INSTALL_DIRS: &[&str] = &["/usr/bin", "/usr/local/bin", "/opt/homebrew/bin"];

#[cfg(not(windows))]
const COMMON_TESSDATA_DIRS: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

/// Finds Tesseract and a tessdata directory holding `<language>.traineddata`,
/// downloading the language file into the bundled tessdata dir if allowed.
pub fn ensure_tesseract(config: &OcrConfig) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable(config.tesseract_path.as_deref())?;
    tracing::info!("Tesseract found at: {}", executable.display());

    let traineddata = traineddata_name(&config.language);
    if let Some(tessdata) = find_tessdata_dir(config.tessdata_dir.as_deref(), &executable, &traineddata) {
        tracing::info!("Using tessdata at: {}", tessdata.display());
        return Ok(TesseractPaths { executable, tessdata });
    }

    if !config.download_missing_tessdata {
        return Err(anyhow!(
            "{} not found and downloads are disabled. Place it in {}",
            traineddata,
            bundled_tessdata_dir(config).display()
        ));
    }

    let tessdata = bundled_tessdata_dir(config);
    fs::create_dir_all(&tessdata)
        .with_context(|| format!("Failed to create {}", tessdata.display()))?;
    download_tessdata(&tessdata, &config.language)?;

    Ok(TesseractPaths { executable, tessdata })
}

fn traineddata_name(language: &str) -> String {
    format!("{}.traineddata", language)
}

/// Where downloaded language files go: the configured dir, else `<exe_dir>/tesseract/tessdata`.
fn bundled_tessdata_dir(config: &OcrConfig) -> PathBuf {
    config
        .tessdata_dir
        .clone()
        .unwrap_or_else(|| crate::paths::get_tesseract_dir().join("tessdata"))
}

/// Finds the Tesseract executable: configured path, next to the executable,
/// common install locations, then `PATH`.
pub fn find_tesseract_executable(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!("Configured tesseract_path {} does not exist", path.display());
    }

    let local_exe = crate::paths::get_tesseract_dir().join(TESSERACT_EXE);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    for dir in COMMON_INSTALL_DIRS {
        let p = Path::new(dir).join(TESSERACT_EXE);
        if p.exists() {
            return Ok(p);
        }
    }

    // Per-user installs (%LOCALAPPDATA%\Programs\Tesseract-OCR on Windows)
    if let Some(local) = dirs::data_local_dir() {
        let p = local.join("Programs").join("Tesseract-OCR").join(TESSERACT_EXE);
        if p.exists() {
            return Ok(p);
        }
    }

    // Check PATH
    if let Ok(output) = Command::new("tesseract").arg("--version").output()
        && output.status.success()
    {
        return Ok(PathBuf::from("tesseract"));
    }

    Err(anyhow!(
        "Tesseract not found. Install Tesseract-OCR, add it to PATH, or set ocr.tesseract_path in config.json"
    ))
}

/// Finds a tessdata directory containing `traineddata`.
pub fn find_tessdata_dir(configured: Option<&Path>, executable: &Path, traineddata: &str) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = configured {
        candidates.push(dir.to_path_buf());
    }
    candidates.push(crate::paths::get_tesseract_dir().join("tessdata"));
    if let Some(parent) = executable.parent().filter(|p| !p.as_os_str().is_empty()) {
        candidates.push(parent.join("tessdata"));
    }
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        candidates.push(PathBuf::from(&prefix));
        candidates.push(PathBuf::from(&prefix).join("tessdata"));
    }
    #[cfg(windows)]
    candidates.extend(COMMON_INSTALL_DIRS.iter().map(|d| Path::new(d).join("tessdata")));
    #[cfg(not(windows))]
    candidates.extend(COMMON_TESSDATA_DIRS.iter().map(PathBuf::from));

    candidates.into_iter().find(|dir| dir.join(traineddata).exists())
}

/// Downloads `<language>.traineddata` from the tessdata_best repository.
fn download_tessdata(tessdata_dir: &Path, language: &str) -> Result<()> {
    let name = traineddata_name(language);
    let url = format!("{}/{}", TESSDATA_REPO, name);
    let path = tessdata_dir.join(&name);

    tracing::info!("Downloading {}...", name);

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&url)
        .header("User-Agent", "bazaar-lens")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}: HTTP {}",
            name,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    // Write under a temporary name so an interrupted download never looks installed.
    let partial = tessdata_dir.join(format!("{}.part", name));
    let mut file = fs::File::create(&partial)?;
    file.write_all(&bytes)?;
    drop(file);
    fs::rename(&partial, &path)?;

    tracing::info!("Downloaded {} ({} bytes)", name, bytes.len());

    Ok(())
}

use std::sync::LazyLock;
use anyhow::{anyhow, Context};
use regex::Regex;
use reqwest::Client;
use url::Url;
use crate::models::{ExamType, StudentRecord, Subject};
use anyhow::Result;

// "(12) SOME NAME" opens a student block.
static STUDENT_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\d+\)\s+(.*)").unwrap());
// "MATH 85" inside a block.
static SUBJECT_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([A-Z]+)\s+(\d+)").unwrap());

const BLOCK_END_MARKER: &str = "Passed in";

// The published file only carries Advanced Level results.
pub const DATASET_EXAM_TYPE: ExamType = ExamType::GceA;

// Asynchronously retrieves the raw results file, over HTTP or from disk depending on the URL scheme.
pub async fn retrieve_results(url: &Url) -> Result<String> {
    match url.scheme() {
        "http" | "https" => {
            let client = Client::builder()
                .build()
                .context("Failed to build the client")?;
            fetch_results(&client, url).await
        }
        "file" => {
            let path = url.to_file_path().map_err(|_| anyhow!("Invalid file URL: {}", url))?;
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read results file {}", path.display()))
        }
        other => Err(anyhow!("Unsupported results URL scheme: {}", other)),
    }
}

async fn fetch_results(client: &Client, url: &Url) -> Result<String> {
    let response = client.get(url.clone())
        .send()
        .await
        .context("Failed to send results request")?;

    if !response.status().is_success() {
        return Err(anyhow!("Results request failed with status {}", response.status()));
    }

    Ok(response.text().await.context("Failed to read response text")?)
}

// Parses the results text into student records, in file order.
//
// Subject lines only count while a block is open; a "Passed in" line or the next
// student line closes it. Anything else is skipped.
pub fn parse_results(text: &str) -> Vec<StudentRecord> {
    let mut records = Vec::new();
    let mut current: Option<StudentRecord> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(captures) = STUDENT_LINE.captures(line) {
            if let Some(record) = current.take() {
                records.push(record);
            }
            let name = captures.get(1).map_or("", |m| m.as_str()).trim();
            current = Some(StudentRecord {
                name: name.to_string(),
                subjects: Vec::new(),
                exam_type: DATASET_EXAM_TYPE,
            });
            continue;
        }

        if line.contains(BLOCK_END_MARKER) {
            if let Some(record) = current.take() {
                records.push(record);
            }
            continue;
        }

        if let (Some(record), Some(captures)) = (current.as_mut(), SUBJECT_LINE.captures(line)) {
            record.subjects.push(Subject {
                code: captures[1].to_string(),
                grade: captures[2].to_string(),
            });
        }
    }

    if let Some(record) = current {
        records.push(record);
    }

    records
}

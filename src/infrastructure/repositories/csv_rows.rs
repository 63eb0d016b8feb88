// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! CSV 形式的表格工作目录
//!
//! 输入：目录下的 .csv 文件，每个文件一个有序行来源。
//! 输出：输出目录下新建的 .csv 表格和纯文本产物。

use crate::domain::repositories::{NamedSource, Row, RowSink, RowSource, Workspace};
use crate::domain::search::SpiderError;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub struct CsvWorkspace {
    output_root: PathBuf,
}

impl CsvWorkspace {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_dir.into(),
        }
    }

    fn output_path(&self, filename: &str) -> Result<PathBuf, SpiderError> {
        fs::create_dir_all(&self.output_root)?;
        Ok(self.output_root.join(sanitize_filename(filename)))
    }
}

impl Workspace for CsvWorkspace {
    fn input_batches(&self, dir: &str) -> Result<Vec<NamedSource>, SpiderError> {
        let path = Path::new(dir);
        if !path.is_dir() {
            return Err(SpiderError::Config(format!("没有找到输入目录：{}", dir)));
        }
        let mut files: Vec<PathBuf> = fs::read_dir(path)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .map(|ext| ext.eq_ignore_ascii_case("csv"))
                        .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files
            .into_iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                NamedSource {
                    name,
                    source: Box::new(CsvRowSource { path }),
                }
            })
            .collect())
    }

    fn create_sheet(&self, filename: &str) -> Result<Box<dyn RowSink>, SpiderError> {
        let file = File::create(self.output_path(filename)?)?;
        Ok(Box::new(CsvRowSink {
            writer: csv::Writer::from_writer(file),
        }))
    }

    fn write_text(&self, filename: &str, content: &str) -> Result<(), SpiderError> {
        fs::write(self.output_path(filename)?, content)?;
        Ok(())
    }
}

pub struct CsvRowSource {
    path: PathBuf,
}

impl RowSource for CsvRowSource {
    fn rows(&mut self) -> Result<Vec<Row>, SpiderError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|cell| {
                        if cell.is_empty() {
                            None
                        } else {
                            Some(cell.to_string())
                        }
                    })
                    .collect(),
            );
        }
        Ok(rows)
    }
}

pub struct CsvRowSink {
    writer: csv::Writer<File>,
}

impl RowSink for CsvRowSink {
    fn append(&mut self, row: &[Option<String>]) -> Result<(), SpiderError> {
        self.writer
            .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SpiderError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// 关键词可能带路径分隔符，落盘前替换掉
fn sanitize_filename(filename: &str) -> String {
    filename.replace(['/', '\\'], "_")
}

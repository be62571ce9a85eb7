// ==========================================
// 物业数据迁移引擎 - CSV 文件解析器
// ==========================================
// 输入: UTF-8、逗号分隔、首行为表头
// 输出: 表头 + 数据行（保留原始行号）+ SHA-256 校验和
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use csv::ReaderBuilder;
use sha2::{Digest, Sha256};
use std::path::Path;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// 一条原始数据行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub row_number: usize, // 从 1 开始，不含表头
    pub values: Vec<String>,
}

impl RawRow {
    /// 按列下标取值（缺失列视为空串）
    pub fn value(&self, index: usize) -> &str {
        self.values.get(index).map(String::as_str).unwrap_or("")
    }
}

/// 解析后的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    pub checksum: String,
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl CsvParser {
    /// 从文件路径解析
    pub fn parse_path(path: &Path) -> ImportResult<ParsedFile> {
        let bytes = Self::read_path(path)?;
        Self::parse_bytes(&bytes)
    }

    /// 读取文件内容（存在性与扩展名检查）
    pub fn read_path(path: &Path) -> ImportResult<Vec<u8>> {
        // 检查文件存在
        if !path.exists() {
            return Err(ImportError::UnreadableFile(format!(
                "文件不存在: {}",
                path.display()
            )));
        }

        // 检查扩展名
        if let Some(ext) = path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnreadableFile(format!(
                    "文件格式不支持: {}（仅支持 .csv）",
                    ext.to_string_lossy()
                )));
            }
        }

        Ok(std::fs::read(path)?)
    }

    /// 从内存字节解析
    pub fn parse_bytes(bytes: &[u8]) -> ImportResult<ParsedFile> {
        let checksum = format!("{:x}", Sha256::digest(bytes));

        let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let text = std::str::from_utf8(body)
            .map_err(|e| ImportError::UnreadableFile(format!("文件不是有效的 UTF-8: {}", e)))?;

        if text.trim().is_empty() {
            return Err(ImportError::UnreadableFile("文件为空，缺少表头行".to_string()));
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(text.as_bytes());

        // 读取表头
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::UnreadableFile("表头行为空".to_string()));
        }

        // 读取所有行
        let mut rows = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            let values: Vec<String> = record.iter().map(|v| v.trim().to_string()).collect();

            // 跳过完全空白的行（行号仍占位）
            if values.iter().all(|v| v.is_empty()) {
                continue;
            }

            rows.push(RawRow {
                row_number: idx + 1,
                values,
            });
        }

        Ok(ParsedFile {
            headers,
            rows,
            checksum,
        })
    }
}

use crate::config::Config;
use crate::models::subject::{master_subjects, Subject, Topic};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// 词表文件中的一个科目
#[derive(Debug, Deserialize)]
struct VocabularyEntry {
    name: String,
    #[serde(default)]
    topics: Vec<String>,
}

/// 词表文件
#[derive(Debug, Deserialize)]
struct VocabularyFile {
    subjects: Vec<VocabularyEntry>,
}

/// 解析 TOML 词表内容
pub fn parse_vocabulary(content: &str) -> Result<Vec<Subject>> {
    let file: VocabularyFile = toml::from_str(content).context("无法解析词表TOML")?;

    let mut subjects: Vec<Subject> = Vec::new();
    for entry in file.subjects {
        let name = entry.name.trim();
        if name.is_empty() {
            anyhow::bail!("词表中存在空的科目名称");
        }
        if subjects.iter().any(|s| s.name == name) {
            tracing::warn!("词表中科目重复，已忽略: {}", name);
            continue;
        }
        let mut subject = Subject::new(name);
        for topic in entry.topics {
            if topic.trim().is_empty() || subject.find_topic_mut(&topic).is_some() {
                continue;
            }
            subject.topics.push(Topic::new(&topic));
        }
        subjects.push(subject);
    }

    if subjects.is_empty() {
        anyhow::bail!("词表中没有任何科目");
    }
    Ok(subjects)
}

/// 从 TOML 文件加载科目词表
pub async fn load_vocabulary_file(path: &Path) -> Result<Vec<Subject>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取词表文件: {}", path.display()))?;

    let subjects = parse_vocabulary(&content)
        .with_context(|| format!("无法解析词表文件: {}", path.display()))?;

    tracing::info!("成功加载词表 {} 个科目", subjects.len());
    Ok(subjects)
}

/// 按配置加载词表：配置了文件则读取文件，否则使用内置词表
pub async fn load_vocabulary(config: &Config) -> Result<Vec<Subject>> {
    match &config.vocabulary_file {
        Some(path) => load_vocabulary_file(path).await,
        None => Ok(master_subjects()),
    }
}

/// 加载封闭式分类使用的主题列表（每行一个，忽略空行和 # 注释）
pub async fn load_master_topics(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取主题列表: {}", path.display()))?;

    let topics: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    tracing::info!("成功加载 {} 个主题", topics.len());
    Ok(topics)
}

//! 科目 / 主题树
//!
//! 科目词表是固定的，主题在分类过程中按需创建。

use phf::phf_map;
use serde::{Deserialize, Serialize};

/// 兜底科目名称
pub const MISCELLANEOUS: &str = "Miscellaneous";

/// 科目图标（仅用于展示，不参与序列化）
static SUBJECT_ICONS: phf::Map<&'static str, &'static str> = phf_map! {
    "Cardiology" => "heart",
    "Pulmonology" => "air-vent",
    "Gastroenterology" => "shield",
    "Neurology" => "brain-circuit",
    "Endocrinology" => "flask-conical",
    "Nephrology" => "filter",
    "Hematology" => "droplets",
    "Rheumatology" => "bone",
    "Infectious Disease" => "bug",
    "Surgery" => "scissors",
    "Pediatrics" => "baby",
    "Obstetrics & Gynecology" => "heart-handshake",
    "Miscellaneous" => "help-circle",
};

/// 默认词表：(科目, 预置主题)
const MASTER_SUBJECTS: &[(&str, &[&str])] = &[
    (
        "Cardiology",
        &[
            "Myocardial Infarction",
            "Hypertension",
            "Atrial Fibrillation",
            "Heart Failure",
            "Valvular Heart Disease",
        ],
    ),
    (
        "Neurology",
        &[
            "Ischemic Stroke",
            "Parkinson's Disease",
            "Epilepsy",
            "Multiple Sclerosis",
            "Migraine",
        ],
    ),
    (
        "Pulmonology",
        &[
            "Asthma",
            "COPD",
            "Pneumonia",
            "Pulmonary Embolism",
            "Tuberculosis",
        ],
    ),
    (
        "Endocrinology",
        &[
            "Diabetes Mellitus Type 2",
            "Hypothyroidism",
            "Cushing's Syndrome",
            "Addison's Disease",
            "Hyperthyroidism",
        ],
    ),
    (
        "Gastroenterology",
        &[
            "Gastroesophageal Reflux Disease (GERD)",
            "Inflammatory Bowel Disease",
            "Peptic Ulcer Disease",
            "Cirrhosis",
        ],
    ),
    (
        "Rheumatology",
        &[
            "Rheumatoid Arthritis",
            "Systemic Lupus Erythematosus",
            "Gout",
            "Osteoarthritis",
        ],
    ),
    ("Nephrology", &[]),
    ("Hematology", &[]),
    ("Infectious Disease", &[]),
    ("Surgery", &[]),
    ("Pediatrics", &[]),
    ("Obstetrics & Gynecology", &[]),
];

/// 主题的归一化键：去掉首尾空白并转小写
pub fn topic_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// 主题下的一道题及其来源文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicQuestion {
    pub text: String,
    pub source_file: String,
}

/// 主题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub questions: Vec<TopicQuestion>,
}

impl Topic {
    /// 创建空主题（名称去掉首尾空白后作为展示名）
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            key: topic_key(name),
            questions: Vec::new(),
        }
    }

    /// 是否与给定名称表示同一主题
    pub fn matches(&self, name: &str) -> bool {
        self.key == topic_key(name)
    }

    /// 题目数量
    pub fn count(&self) -> usize {
        self.questions.len()
    }

    /// 出现过该主题的文件（按首次出现顺序去重）
    pub fn files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = Vec::new();
        for q in &self.questions {
            if !files.contains(&q.source_file.as_str()) {
                files.push(&q.source_file);
            }
        }
        files
    }

    /// 从存储恢复后重新计算归一化键
    pub(crate) fn rehydrate(&mut self) {
        self.key = topic_key(&self.name);
    }
}

/// 科目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    #[serde(default)]
    pub topics: Vec<Topic>,
}

impl Subject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topics: Vec::new(),
        }
    }

    /// 展示用图标名称
    pub fn icon(&self) -> &'static str {
        SUBJECT_ICONS
            .get(self.name.as_str())
            .copied()
            .unwrap_or("help-circle")
    }

    /// 按归一化键查找主题
    pub fn find_topic_mut(&mut self, name: &str) -> Option<&mut Topic> {
        let key = topic_key(name);
        self.topics.iter_mut().find(|t| t.key == key)
    }

    /// 该科目下的题目总数
    pub fn question_count(&self) -> usize {
        self.topics.iter().map(Topic::count).sum()
    }
}

/// 内置默认词表（所有主题为空）
pub fn master_subjects() -> Vec<Subject> {
    MASTER_SUBJECTS
        .iter()
        .map(|(name, topics)| Subject {
            name: name.to_string(),
            topics: topics.iter().map(|t| Topic::new(t)).collect(),
        })
        .collect()
}

/// 词表中的科目名称
pub fn subject_names(subjects: &[Subject]) -> Vec<String> {
    subjects.iter().map(|s| s.name.clone()).collect()
}

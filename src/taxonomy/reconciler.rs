//! 科目树合并
//!
//! 把分类结果并入科目树。所有函数都接收借用的旧树，返回新树，
//! 调用方在持久化成功后再替换。

use tracing::{debug, info, warn};

use crate::config::UnmatchedSubjectPolicy;
use crate::models::{ClassifiedQuestion, Subject, Topic, TopicQuestion, MISCELLANEOUS};

/// 把一批分类结果并入科目树
///
/// - 科目按名称精确匹配；词表外的科目按 `policy` 丢弃或归入 Miscellaneous
/// - 主题按归一化键（去空白、忽略大小写）匹配，匹配不到时新建
/// - 只会新建主题，不会新建科目
pub fn reconcile(
    subjects: &[Subject],
    questions: &[ClassifiedQuestion],
    source_file: &str,
    policy: UnmatchedSubjectPolicy,
) -> Vec<Subject> {
    let mut tree = subjects.to_vec();
    let mut attached = 0;
    let mut created = 0;
    let mut dropped = 0;

    for question in questions {
        let slot = match tree.iter().position(|s| s.name == question.subject) {
            Some(idx) => Some(idx),
            None => match policy {
                UnmatchedSubjectPolicy::Drop => None,
                UnmatchedSubjectPolicy::Miscellaneous => {
                    tree.iter().position(|s| s.name == MISCELLANEOUS)
                }
            },
        };
        let Some(idx) = slot else {
            warn!(
                "⚠️ 科目 '{}' 不在词表中，题目已丢弃: {}",
                question.subject, question
            );
            dropped += 1;
            continue;
        };

        let subject = &mut tree[idx];
        let entry = TopicQuestion {
            text: question.question.clone(),
            source_file: source_file.to_string(),
        };
        match subject.find_topic_mut(&question.topic) {
            Some(topic) => topic.questions.push(entry),
            None => {
                debug!("新建主题: {} / {}", subject.name, question.topic.trim());
                let mut topic = Topic::new(&question.topic);
                topic.questions.push(entry);
                subject.topics.push(topic);
                created += 1;
            }
        }
        attached += 1;
    }

    info!(
        "✓ 合并完成 ({}): 归档 {} 道，新建主题 {} 个，丢弃 {} 道",
        source_file, attached, created, dropped
    );
    tree
}

/// 删除某个文件带来的全部题目
///
/// 只删除因本次删除而变空的主题，原本就为空的预置主题保留。
pub fn remove_source_file(subjects: &[Subject], source_file: &str) -> Vec<Subject> {
    let mut tree = subjects.to_vec();
    let mut removed = 0;

    for subject in &mut tree {
        subject.topics.retain_mut(|topic| {
            let before = topic.count();
            topic.questions.retain(|q| q.source_file != source_file);
            removed += before - topic.count();
            before == 0 || topic.count() > 0
        });
    }

    info!("✓ 已删除文件 {} 的 {} 道题目", source_file, removed);
    tree
}

/// 科目树中出现过的来源文件（按首次出现顺序去重）
pub fn uploaded_files(subjects: &[Subject]) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();
    for topic in subjects.iter().flat_map(|s| s.topics.iter()) {
        for file in topic.files() {
            if !files.iter().any(|f| f == file) {
                files.push(file.to_string());
            }
        }
    }
    files
}

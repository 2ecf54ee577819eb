//! 持久化适配
//!
//! 科目树和作答统计分别存成两个 JSON 值。读取时把存储的数据叠加到内置词表上，
//! 缺失或损坏的数据按默认值处理。

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::infrastructure::KeyValueStore;
use crate::models::{PerformanceData, Subject, Topic};

/// 科目树的存储键
pub const SUBJECTS_KEY: &str = "medHotspotData";
/// 作答统计的存储键
pub const PERFORMANCE_KEY: &str = "medPerformanceData";

/// 持久化适配器
pub struct PersistenceAdapter {
    store: Arc<dyn KeyValueStore>,
    master: Vec<Subject>,
}

impl PersistenceAdapter {
    /// `master` 为当前词表（含预置主题），决定读取结果包含哪些科目
    pub fn new(store: Arc<dyn KeyValueStore>, master: Vec<Subject>) -> Self {
        Self { store, master }
    }

    pub fn master(&self) -> &[Subject] {
        &self.master
    }

    /// 读取科目树
    ///
    /// - 以词表为准：词表外的科目被丢弃
    /// - 保留存储中的主题，补上存储中缺少的预置主题
    /// - 数据缺失或无法解析时返回词表本身
    pub fn load_subjects(&self) -> Vec<Subject> {
        let Some(raw) = self.store.get(SUBJECTS_KEY) else {
            debug!("没有已保存的科目数据，使用默认词表");
            return self.master.clone();
        };
        match serde_json::from_str::<Vec<Subject>>(&raw) {
            Ok(stored) => merge_onto_master(&self.master, stored),
            Err(e) => {
                warn!("⚠️ 已保存的科目数据无法解析，使用默认词表: {}", e);
                self.master.clone()
            }
        }
    }

    pub fn save_subjects(&self, subjects: &[Subject]) -> Result<(), StorageError> {
        self.save(SUBJECTS_KEY, subjects)
    }

    /// 读取作答统计；缺失或无法解析时为空
    pub fn load_performance(&self) -> PerformanceData {
        let Some(raw) = self.store.get(PERFORMANCE_KEY) else {
            return PerformanceData::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("⚠️ 已保存的作答统计无法解析，已重置: {}", e);
            PerformanceData::new()
        })
    }

    pub fn save_performance(&self, performance: &PerformanceData) -> Result<(), StorageError> {
        self.save(PERFORMANCE_KEY, performance)
    }

    /// 删除两项数据
    ///
    /// 两项都会尝试删除；有失败时返回第一个错误
    pub fn clear(&self) -> Result<(), StorageError> {
        let subjects = self.store.remove(SUBJECTS_KEY);
        let performance = self.store.remove(PERFORMANCE_KEY);
        match (subjects, performance) {
            (Ok(()), Ok(())) => {
                info!("✓ 本地数据已清空");
                Ok(())
            }
            (Err(e), Ok(())) => {
                warn!("⚠️ 作答统计已删除，科目数据删除失败: {}", e);
                Err(e)
            }
            (Ok(()), Err(e)) => {
                warn!("⚠️ 科目数据已删除，作答统计删除失败: {}", e);
                Err(e)
            }
            (Err(e), Err(other)) => {
                warn!("⚠️ 本地数据删除失败: {}; {}", e, other);
                Err(e)
            }
        }
    }

    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value).map_err(|source| StorageError::SerializeFailed {
            key: key.to_string(),
            source,
        })?;
        self.store.set(key, &json)
    }
}

/// 把存储的科目树叠加到词表上
fn merge_onto_master(master: &[Subject], stored: Vec<Subject>) -> Vec<Subject> {
    for subject in &stored {
        if !master.iter().any(|m| m.name == subject.name) {
            warn!("⚠️ 已保存的科目 '{}' 不在词表中，已忽略", subject.name);
        }
    }

    master
        .iter()
        .map(|m| {
            let Some(saved) = stored.iter().find(|s| s.name == m.name) else {
                return m.clone();
            };

            let mut topics: Vec<Topic> = Vec::new();
            for topic in &saved.topics {
                let mut topic = topic.clone();
                topic.rehydrate();
                // 同一归一化键只保留一个主题
                match topics.iter_mut().find(|t| t.key == topic.key) {
                    Some(existing) => existing.questions.extend(topic.questions),
                    None => topics.push(topic),
                }
            }
            for seeded in &m.topics {
                if !topics.iter().any(|t| t.key == seeded.key) {
                    topics.push(seeded.clone());
                }
            }

            Subject {
                name: m.name.clone(),
                topics,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemoryStore;
    use crate::models::{master_subjects, TopicQuestion};

    fn adapter() -> (Arc<MemoryStore>, PersistenceAdapter) {
        let store = Arc::new(MemoryStore::new());
        let adapter = PersistenceAdapter::new(store.clone(), master_subjects());
        (store, adapter)
    }

    #[test]
    fn test_missing_and_corrupt_data_fall_back_to_defaults() {
        let (store, adapter) = adapter();
        assert_eq!(adapter.load_subjects(), master_subjects());
        assert!(adapter.load_performance().is_empty());

        store.set(SUBJECTS_KEY, "{not json").unwrap();
        store.set(PERFORMANCE_KEY, "[]").unwrap();
        assert_eq!(adapter.load_subjects(), master_subjects());
        assert!(adapter.load_performance().is_empty());
    }

    #[test]
    fn test_stored_topics_merged_onto_master() {
        let (store, adapter) = adapter();
        // 旧数据：没有 key 字段、有词表外科目、有重复主题
        store
            .set(
                SUBJECTS_KEY,
                r#"[
                    {"name": "Neurology", "topics": [
                        {"name": "Cluster Headache", "questions": [{"text": "Q1", "source_file": "a.pdf"}]},
                        {"name": "cluster headache ", "questions": [{"text": "Q2", "source_file": "b.pdf"}]}
                    ]},
                    {"name": "Astrology", "topics": [{"name": "Stars"}]}
                ]"#,
            )
            .unwrap();

        let subjects = adapter.load_subjects();
        assert_eq!(subjects.len(), master_subjects().len());
        assert!(subjects.iter().all(|s| s.name != "Astrology"));

        let neuro = subjects.iter().find(|s| s.name == "Neurology").unwrap();
        assert_eq!(neuro.topics[0].name, "Cluster Headache");
        assert_eq!(neuro.topics[0].key, "cluster headache");
        assert_eq!(
            neuro.topics[0].questions,
            vec![
                TopicQuestion { text: "Q1".into(), source_file: "a.pdf".into() },
                TopicQuestion { text: "Q2".into(), source_file: "b.pdf".into() },
            ]
        );
        // 预置主题补在后面
        assert!(neuro.topics.iter().any(|t| t.name == "Migraine"));
    }

    /// 删除指定键时失败的存储
    struct StuckKey {
        inner: MemoryStore,
        stuck: &'static str,
    }

    impl KeyValueStore for StuckKey {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            if key == self.stuck {
                return Err(StorageError::RemoveFailed {
                    key: key.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                });
            }
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_clear_attempts_both_keys() {
        let store = Arc::new(StuckKey {
            inner: MemoryStore::new(),
            stuck: SUBJECTS_KEY,
        });
        let adapter = PersistenceAdapter::new(store.clone(), master_subjects());
        adapter.save_subjects(&master_subjects()).unwrap();
        adapter.save_performance(&PerformanceData::new()).unwrap();

        let err = adapter.clear().unwrap_err();

        assert!(matches!(err, StorageError::RemoveFailed { ref key, .. } if key == SUBJECTS_KEY));
        assert!(store.get(PERFORMANCE_KEY).is_none());
        assert!(store.get(SUBJECTS_KEY).is_some());
    }

    #[test]
    fn test_save_load_and_clear() {
        let (store, adapter) = adapter();
        let mut subjects = master_subjects();
        subjects[0].topics[0].questions.push(TopicQuestion {
            text: "Q".into(),
            source_file: "x.pdf".into(),
        });
        adapter.save_subjects(&subjects).unwrap();
        adapter.save_performance(&PerformanceData::new()).unwrap();
        assert_eq!(adapter.load_subjects(), subjects);

        adapter.clear().unwrap();
        assert!(store.get(SUBJECTS_KEY).is_none());
        assert!(store.get(PERFORMANCE_KEY).is_none());
        assert_eq!(adapter.load_subjects(), master_subjects());
    }
}

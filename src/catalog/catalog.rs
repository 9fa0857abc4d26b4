//! 规则目录
//! 写时复制：导入在私有副本上合并并建索引，完成后整体替换快照；
//! 进行中的净化持有旧快照的 Arc，不会看到半更新的规则集

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;

use super::index::HostIndex;
use crate::compiler::{CompiledBatch, CompiledRule};

/// 目录中的一条规则
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub rule: Arc<CompiledRule>,
    /// 首次导入的序号，按 id 替换时保持不变
    pub seq: u64,
}

/// 不可变的目录快照
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    entries: Vec<CatalogEntry>,
    by_id: HashMap<String, usize>,
    index: HostIndex,
}

impl CatalogSnapshot {
    fn build(entries: Vec<CatalogEntry>) -> Self {
        let by_id = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.rule.id.clone(), position))
            .collect();
        let index = HostIndex::build(entries.iter().map(|entry| entry.rule.as_ref()));
        Self { entries, by_id, index }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.by_id.get(id).map(|&position| &self.entries[position])
    }

    /// 按序号排列的全部条目
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// 经索引筛选出的候选条目（未做完整模式校验）
    pub fn candidates(&self, host: Option<&str>) -> impl Iterator<Item = &CatalogEntry> {
        self.index
            .candidates(host)
            .into_iter()
            .map(move |position| &self.entries[position])
    }

    pub fn index(&self) -> &HostIndex {
        &self.index
    }
}

/// 规则目录（进程生命周期内唯一拥有全部规则）
#[derive(Debug, Default)]
pub struct RuleCatalog {
    current: RwLock<Arc<CatalogSnapshot>>,
    // 串行化导入；值为下一个可用序号
    writer: Mutex<u64>,
}

impl RuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前快照
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// 合并一批已编译规则：同 id 替换（保留原序号），其余追加
    pub fn merge(&self, batch: CompiledBatch) -> Arc<CatalogSnapshot> {
        let mut next_seq = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let base = self.snapshot();

        let mut entries = base.entries.clone();
        let mut positions = base.by_id.clone();
        let mut replaced = 0usize;
        for rule in batch.rules {
            let rule = Arc::new(rule);
            match positions.get(&rule.id) {
                Some(&position) => {
                    entries[position].rule = rule;
                    replaced += 1;
                }
                None => {
                    positions.insert(rule.id.clone(), entries.len());
                    entries.push(CatalogEntry { rule, seq: *next_seq });
                    *next_seq += 1;
                }
            }
        }

        let snapshot = Arc::new(CatalogSnapshot::build(entries));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        debug!(
            "Catalog updated: {} rules ({} replaced), index {} exact / {} suffix / {} fallback",
            snapshot.len(),
            replaced,
            snapshot.index.exact_len(),
            snapshot.index.suffix_len(),
            snapshot.index.fallback_len()
        );
        snapshot
    }
}

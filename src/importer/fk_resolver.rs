// ==========================================
// 物业数据迁移引擎 - 外键解析器 (Foreign-Key Resolver)
// ==========================================
// 职责: 引用文本 → 内部 ID
// 顺序: 人工指定 → 名称精确匹配（大小写不敏感）→ 标准化名称/地址匹配 → 模糊匹配
// 红线: 多个同等强度候选或零候选一律 Unresolved，绝不猜测缺省值
// 缓存: 单次导入会话内有效；候选列表与解析结果均为“首写者胜出”
// ==========================================

use crate::domain::types::EntityType;
use crate::importer::data_cleaner::{normalize_address, normalize_text, tokens};
use crate::repository::entity_store::{EntityStore, ReferenceCandidate};
use crate::repository::error::{RepositoryError, RepositoryResult};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use strsim::{jaro_winkler, normalized_levenshtein};
use tracing::debug;

/// 默认模糊匹配阈值
pub const DEFAULT_FK_FUZZY_THRESHOLD: f64 = 0.90;
/// 两个候选得分差小于该值视为同等强度
pub const AMBIGUITY_MARGIN: f64 = 0.02;
/// 未解析时附带的最多候选数
const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnresolvedReason {
    Ambiguous,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Resolution {
    Resolved(String),
    Unresolved {
        reason: UnresolvedReason,
        candidates: Vec<ReferenceCandidate>,
    },
}

impl Resolution {
    fn not_found(candidates: Vec<ReferenceCandidate>) -> Self {
        Resolution::Unresolved {
            reason: UnresolvedReason::NotFound,
            candidates,
        }
    }

    fn ambiguous(candidates: Vec<ReferenceCandidate>) -> Self {
        Resolution::Unresolved {
            reason: UnresolvedReason::Ambiguous,
            candidates,
        }
    }
}

// ==========================================
// 纯匹配逻辑
// ==========================================

/// 在候选集中解析引用文本
pub fn match_reference(reference: &str, candidates: &[ReferenceCandidate], threshold: f64) -> Resolution {
    let wanted = reference.trim().to_lowercase();
    if wanted.is_empty() {
        return Resolution::not_found(Vec::new());
    }

    // ===== 1. 名称精确匹配 =====
    let exact: Vec<&ReferenceCandidate> = candidates
        .iter()
        .filter(|c| c.name.trim().to_lowercase() == wanted)
        .collect();
    if let Some(resolution) = decide(&exact) {
        return resolution;
    }

    // ===== 2. 标准化名称 / 地址匹配 =====
    let wanted_name = normalize_text(reference);
    let wanted_address = normalize_address(reference);
    let normalized: Vec<&ReferenceCandidate> = candidates
        .iter()
        .filter(|c| {
            normalize_text(&c.name) == wanted_name
                || c
                    .address
                    .as_deref()
                    .map(|a| normalize_address(a) == wanted_address)
                    .unwrap_or(false)
        })
        .collect();
    if let Some(resolution) = decide(&normalized) {
        return resolution;
    }

    // ===== 3. 模糊匹配 =====
    // 标识词（门牌号、楼号、单字母）不一致的候选不能被采纳，只参与歧义判断
    let mut scored: Vec<(FuzzyScore, &ReferenceCandidate)> = candidates
        .iter()
        .map(|c| (candidate_score(&wanted_name, &wanted_address, c), c))
        .collect();
    // 得分降序；同分按候选原始顺序（稳定排序）
    scored.sort_by(|a, b| b.0.overall.total_cmp(&a.0.overall));

    let mut accepted: Vec<(f64, &ReferenceCandidate)> = scored
        .iter()
        .filter_map(|(score, c)| score.accepted.filter(|s| *s >= threshold).map(|s| (s, *c)))
        .collect();
    accepted.sort_by(|a, b| b.0.total_cmp(&a.0));

    let Some(&(best_score, best)) = accepted.first() else {
        let near: Vec<ReferenceCandidate> = scored
            .iter()
            .take_while(|(score, _)| score.overall >= threshold)
            .map(|(_, c)| (*c).clone())
            .collect();
        // 多个候选仅在标识词上不同：引用本身不够具体
        if near.len() > 1 {
            return Resolution::ambiguous(near);
        }
        let suggestions = scored
            .iter()
            .take(MAX_SUGGESTIONS)
            .map(|(_, c)| (*c).clone())
            .collect();
        return Resolution::not_found(suggestions);
    };

    let rivals: Vec<ReferenceCandidate> = accepted
        .iter()
        .take_while(|(score, _)| best_score - score < AMBIGUITY_MARGIN)
        .map(|(_, c)| (*c).clone())
        .collect();
    if rivals.len() > 1 {
        return Resolution::ambiguous(rivals);
    }

    Resolution::Resolved(best.id.clone())
}

fn decide(matches: &[&ReferenceCandidate]) -> Option<Resolution> {
    match matches {
        [] => None,
        [only] => Some(Resolution::Resolved(only.id.clone())),
        many => Some(Resolution::ambiguous(many.iter().map(|c| (*c).clone()).collect())),
    }
}

/// 模糊得分: max(归一化编辑距离, Jaro-Winkler × 词包含度)
///
/// 词包含度 = 共有词数 / 较短一方的词数；避免仅凭相同前缀就高分
fn fuzzy_score(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let ta = tokens(a);
    let tb = tokens(b);
    let shortest = ta.len().min(tb.len()).max(1);
    let shared = ta.iter().filter(|t| tb.contains(t)).count();
    let containment = shared as f64 / shortest as f64;

    normalized_levenshtein(a, b).max(jaro_winkler(a, b) * containment)
}

/// 标识词: 含数字或只有一个字符的词（"3b"、"12"、"a"）
fn identifier_tokens(normalized: &str) -> BTreeSet<&str> {
    normalized
        .split(' ')
        .filter(|t| t.chars().count() == 1 || t.chars().any(|c| c.is_ascii_digit()))
        .collect()
}

fn identifiers_agree(a: &str, b: &str) -> bool {
    identifier_tokens(a) == identifier_tokens(b)
}

#[derive(Debug, Clone, Copy)]
struct FuzzyScore {
    /// 名称/地址两侧的最高分
    overall: f64,
    /// 标识词一致那一侧的最高分；None 表示不可采纳
    accepted: Option<f64>,
}

fn candidate_score(wanted_name: &str, wanted_address: &str, candidate: &ReferenceCandidate) -> FuzzyScore {
    let name = normalize_text(&candidate.name);
    let mut sides = vec![(fuzzy_score(wanted_name, &name), identifiers_agree(wanted_name, &name))];
    if let Some(address) = candidate.address.as_deref().map(normalize_address) {
        sides.push((
            fuzzy_score(wanted_address, &address),
            identifiers_agree(wanted_address, &address),
        ));
    }

    FuzzyScore {
        overall: sides.iter().map(|(score, _)| *score).fold(0.0, f64::max),
        accepted: sides
            .iter()
            .filter(|(_, agree)| *agree)
            .map(|(score, _)| *score)
            .reduce(f64::max),
    }
}

// ==========================================
// ForeignKeyResolver - 会话级缓存
// ==========================================
pub struct ForeignKeyResolver {
    store: Arc<dyn EntityStore>,
    threshold: f64,
    candidates: RwLock<HashMap<EntityType, Arc<Vec<ReferenceCandidate>>>>,
    resolutions: RwLock<HashMap<(EntityType, String), Resolution>>,
}

impl ForeignKeyResolver {
    pub fn new(store: Arc<dyn EntityStore>, threshold: f64) -> Self {
        Self {
            store,
            threshold,
            candidates: RwLock::new(HashMap::new()),
            resolutions: RwLock::new(HashMap::new()),
        }
    }

    async fn candidates_for(&self, target: EntityType) -> RepositoryResult<Arc<Vec<ReferenceCandidate>>> {
        {
            let cache = self
                .candidates
                .read()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            if let Some(found) = cache.get(&target) {
                return Ok(Arc::clone(found));
            }
        }

        let fetched = Arc::new(self.store.reference_candidates(target).await?);
        debug!(entity = %target, count = fetched.len(), "加载外键候选");

        let mut cache = self
            .candidates
            .write()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        Ok(Arc::clone(cache.entry(target).or_insert(fetched)))
    }

    /// 解析引用
    ///
    /// # 参数
    /// - override_id: 操作员指定的目标 ID（优先，但必须是真实存在的候选）
    pub async fn resolve(
        &self,
        target: EntityType,
        reference: &str,
        override_id: Option<&str>,
    ) -> RepositoryResult<Resolution> {
        let candidates = self.candidates_for(target).await?;

        if let Some(id) = override_id {
            return Ok(match candidates.iter().find(|c| c.id == id) {
                Some(c) => Resolution::Resolved(c.id.clone()),
                None => Resolution::not_found(Vec::new()),
            });
        }

        let key = (target, reference.trim().to_lowercase());
        {
            let cache = self
                .resolutions
                .read()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            if let Some(hit) = cache.get(&key) {
                return Ok(hit.clone());
            }
        }

        let resolution = match_reference(reference, &candidates, self.threshold);
        let mut cache = self
            .resolutions
            .write()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        Ok(cache.entry(key).or_insert(resolution).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<ReferenceCandidate> {
        vec![
            ReferenceCandidate::new("b-1", "Edificio Sol", Some("Calle Mayor 12")),
            ReferenceCandidate::new("b-2", "Torre Norte A", Some("Avenida de la Paz 3")),
            ReferenceCandidate::new("b-3", "Torre Norte B", Some("Avenida de la Paz 5")),
            ReferenceCandidate::new("b-4", "Residencial Las Lomas", None),
        ]
    }

    #[test]
    fn test_exact_name_is_case_insensitive() {
        assert_eq!(
            match_reference("edificio SOL", &candidates(), DEFAULT_FK_FUZZY_THRESHOLD),
            Resolution::Resolved("b-1".to_string())
        );
    }

    #[test]
    fn test_normalized_address_match() {
        assert_eq!(
            match_reference("C/ Mayor, 12", &candidates(), DEFAULT_FK_FUZZY_THRESHOLD),
            Resolution::Resolved("b-1".to_string())
        );
        assert_eq!(
            match_reference("Residencial las Lómas", &candidates(), DEFAULT_FK_FUZZY_THRESHOLD),
            Resolution::Resolved("b-4".to_string())
        );
    }

    #[test]
    fn test_near_identical_names_are_ambiguous() {
        match match_reference("Torre Norte", &candidates(), DEFAULT_FK_FUZZY_THRESHOLD) {
            Resolution::Unresolved { reason, candidates } => {
                assert_eq!(reason, UnresolvedReason::Ambiguous);
                let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
                assert_eq!(ids, vec!["b-2", "b-3"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn test_fuzzy_typo_resolves() {
        assert_eq!(
            match_reference("Edifcio Sol", &candidates(), DEFAULT_FK_FUZZY_THRESHOLD),
            Resolution::Resolved("b-1".to_string())
        );
    }

    #[test]
    fn test_shared_prefix_is_not_a_match() {
        let result = match_reference("Edificio Luna", &candidates(), DEFAULT_FK_FUZZY_THRESHOLD);
        assert!(matches!(
            result,
            Resolution::Unresolved {
                reason: UnresolvedReason::NotFound,
                ..
            }
        ));
    }

    #[test]
    fn test_no_candidates() {
        assert_eq!(
            match_reference("Edificio Sol", &[], DEFAULT_FK_FUZZY_THRESHOLD),
            Resolution::not_found(Vec::new())
        );
    }

    fn assert_not_found(result: Resolution) {
        assert!(
            matches!(
                result,
                Resolution::Unresolved {
                    reason: UnresolvedReason::NotFound,
                    ..
                }
            ),
            "expected NotFound, got {result:?}"
        );
    }

    #[test]
    fn test_different_unit_number_is_not_a_match() {
        let units = vec![ReferenceCandidate::new("u-3a", "Edificio Sol 3A", None)];
        assert_not_found(match_reference("Edificio Sol 3B", &units, DEFAULT_FK_FUZZY_THRESHOLD));
    }

    #[test]
    fn test_different_tower_letter_is_not_a_match() {
        let towers = vec![ReferenceCandidate::new("b-b", "Torre Norte B", Some("Avenida de la Paz 5"))];
        assert_not_found(match_reference("Torre Norte A", &towers, DEFAULT_FK_FUZZY_THRESHOLD));
    }

    #[test]
    fn test_different_street_number_is_not_a_match() {
        let buildings = vec![ReferenceCandidate::new("b-12", "Edificio Sol", Some("Calle Mayor 12"))];
        assert_not_found(match_reference("Calle Mayor 14", &buildings, DEFAULT_FK_FUZZY_THRESHOLD));
    }

    #[test]
    fn test_typo_with_matching_identifier_still_resolves() {
        assert_eq!(
            match_reference("Torre Nrte A", &candidates(), DEFAULT_FK_FUZZY_THRESHOLD),
            Resolution::Resolved("b-2".to_string())
        );
        let units = vec![
            ReferenceCandidate::new("u-3a", "Edificio Sol 3A", None),
            ReferenceCandidate::new("u-3b", "Edificio Sol 3B", None),
        ];
        assert_eq!(
            match_reference("Edifcio Sol 3B", &units, DEFAULT_FK_FUZZY_THRESHOLD),
            Resolution::Resolved("u-3b".to_string())
        );
    }
}

//! Record - 쿼리 결과 레코드
//!
//! 레코드, 쿼리 결과, 결과 요약

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::error::{DriverError, DriverResult};
use super::Value;
use crate::bolt::ValueMap;

// ============================================================================
// Record - 단일 레코드
// ============================================================================

/// 쿼리 결과 레코드
///
/// 키 목록은 같은 결과의 모든 레코드가 공유합니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 컬럼 키
    keys: Arc<[String]>,
    /// 값들
    values: Vec<Value>,
}

impl Record {
    /// 새 레코드 생성
    pub fn new(keys: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { keys, values }
    }

    /// 키 목록
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// 값 목록
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// 레코드 길이
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 빈 레코드 여부
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 키로 값 가져오기
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.keys
            .iter()
            .position(|k| k == key)
            .and_then(|i| self.values.get(i))
    }

    /// 인덱스로 값 가져오기
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// 키 존재 여부
    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Map으로 변환
    pub fn to_map(&self) -> ValueMap {
        self.keys
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }

    /// 값 소유권 가져오기
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self
            .keys
            .iter()
            .zip(self.values.iter())
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = std::iter::Zip<std::slice::Iter<'a, String>, std::slice::Iter<'a, Value>>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter().zip(self.values.iter())
    }
}

// ============================================================================
// ResultSummary - 결과 요약
// ============================================================================

/// 쿼리 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryType {
    /// 읽기 전용
    ReadOnly,
    /// 읽기/쓰기
    ReadWrite,
    /// 쓰기 전용
    WriteOnly,
    /// 스키마 변경
    SchemaWrite,
    /// 서버가 알려주지 않음
    #[default]
    Unknown,
}

impl QueryType {
    fn parse(s: &str) -> Self {
        match s {
            "r" => Self::ReadOnly,
            "rw" => Self::ReadWrite,
            "w" => Self::WriteOnly,
            "s" => Self::SchemaWrite,
            _ => Self::Unknown,
        }
    }
}

/// 카운터
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counters {
    pub nodes_created: i64,
    pub nodes_deleted: i64,
    pub relationships_created: i64,
    pub relationships_deleted: i64,
    pub properties_set: i64,
    pub labels_added: i64,
    pub labels_removed: i64,
    pub indexes_added: i64,
    pub indexes_removed: i64,
    pub constraints_added: i64,
    pub constraints_removed: i64,
    pub system_updates: i64,
}

impl Counters {
    /// `stats` 맵에서 파싱 (없는 키는 0)
    pub fn from_stats(stats: &ValueMap) -> Self {
        let get = |key: &str| stats.get_int(key).unwrap_or(0);
        Self {
            nodes_created: get("nodes-created"),
            nodes_deleted: get("nodes-deleted"),
            relationships_created: get("relationships-created"),
            relationships_deleted: get("relationships-deleted"),
            properties_set: get("properties-set"),
            labels_added: get("labels-added"),
            labels_removed: get("labels-removed"),
            indexes_added: get("indexes-added"),
            indexes_removed: get("indexes-removed"),
            constraints_added: get("constraints-added"),
            constraints_removed: get("constraints-removed"),
            system_updates: get("system-updates"),
        }
    }

    /// 변경 사항 존재 여부
    pub fn contains_updates(&self) -> bool {
        self.nodes_created > 0
            || self.nodes_deleted > 0
            || self.relationships_created > 0
            || self.relationships_deleted > 0
            || self.properties_set > 0
            || self.labels_added > 0
            || self.labels_removed > 0
            || self.indexes_added > 0
            || self.indexes_removed > 0
            || self.constraints_added > 0
            || self.constraints_removed > 0
    }

    /// 시스템(스키마, 관리) 변경 존재 여부
    pub fn contains_system_updates(&self) -> bool {
        self.system_updates > 0
            || self.indexes_added > 0
            || self.indexes_removed > 0
            || self.constraints_added > 0
            || self.constraints_removed > 0
    }
}

/// 결과 요약
///
/// RUN 응답과 PULL 응답의 메타데이터를 합친 것입니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSummary {
    /// 쿼리 타입
    pub query_type: QueryType,
    /// 카운터
    pub counters: Counters,
    /// 데이터베이스
    pub database: Option<String>,
    /// 첫 레코드까지 걸린 시간 (`t_first`)
    pub result_available_after: Option<Duration>,
    /// 결과 소비 시간 (`t_last`)
    pub result_consumed_after: Option<Duration>,
    /// 원본 메타데이터
    pub metadata: ValueMap,
}

impl ResultSummary {
    /// 메타데이터 맵에서 생성
    pub fn from_metadata(metadata: ValueMap) -> Self {
        let millis = |key: &str| {
            metadata
                .get_int(key)
                .map(|ms| Duration::from_millis(ms.max(0) as u64))
        };
        Self {
            query_type: metadata.get_str("type").map(QueryType::parse).unwrap_or_default(),
            counters: metadata
                .get("stats")
                .and_then(|v| v.as_map())
                .map(Counters::from_stats)
                .unwrap_or_default(),
            database: metadata.get_str("db").map(str::to_string),
            result_available_after: millis("t_first"),
            result_consumed_after: millis("t_last"),
            metadata,
        }
    }
}

// ============================================================================
// QueryResult - 쿼리 결과
// ============================================================================

/// 쿼리 결과
///
/// 행은 반복할 때 키와 묶여 [`Record`]가 됩니다. 한 번만 소비할 수 있습니다.
#[derive(Debug)]
pub struct QueryResult {
    keys: Arc<[String]>,
    rows: std::vec::IntoIter<Vec<Value>>,
    summary: ResultSummary,
    consumed: bool,
}

impl QueryResult {
    /// 새 결과 생성
    pub fn new(keys: Vec<String>, rows: Vec<Vec<Value>>, summary: ResultSummary) -> Self {
        Self {
            keys: keys.into(),
            rows: rows.into_iter(),
            summary,
            consumed: false,
        }
    }

    /// 컬럼 키
    pub fn fields(&self) -> &[String] {
        &self.keys
    }

    /// 결과 요약
    pub fn summary(&self) -> &ResultSummary {
        &self.summary
    }

    /// 반복이 시작되었는지 여부
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// 남은 행 수
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    /// 정확히 하나의 레코드
    pub fn single(mut self) -> DriverResult<Record> {
        let remaining = self.remaining();
        match (self.next(), remaining) {
            (Some(record), 1) => Ok(record),
            _ => Err(DriverError::session(format!(
                "Expected a single record, got {}",
                remaining
            ))),
        }
    }
}

impl Iterator for QueryResult {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        self.consumed = true;
        self.rows
            .next()
            .map(|values| Record::new(Arc::clone(&self.keys), values))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

// ============================================================================
// Tests
// ============================================================================

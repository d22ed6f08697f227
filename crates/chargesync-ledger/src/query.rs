//! SQL issued against the usage database

/// Identifier bounds across the whole ledger
pub(crate) const BOUNDS: &str = "SELECT MIN(dbid), MAX(dbid) FROM JobUsageRecord";

/// One window of summaries.
///
/// `?1` and `?2` bound the `dbid` range (half-open), `?3` is the scope
/// pattern. Each summary is identified by the largest `dbid` it covers.
/// Every value except the identifier is read back as text.
pub(crate) const WINDOW: &str = r#"
SELECT
    MAX(JUR.dbid),
    CAST(JUR.ResourceType AS TEXT),
    CAST(JURM.ProbeName AS TEXT),
    CAST(JUR.LocalUserId AS TEXT),
    CAST(SUM(JUR.Charge) AS TEXT),
    CAST(SUM(JUR.WallDuration) AS TEXT),
    CAST(SUM(JUR.CpuUserDuration + JUR.CpuSystemDuration) AS TEXT),
    CAST(JUR.NodeCount AS TEXT),
    CAST(SUM(JUR.Njobs) AS TEXT),
    CAST(JUR.Processors AS TEXT),
    CAST(MAX(JUR.EndTime) AS TEXT),
    CAST(JUR.MachineName AS TEXT),
    CAST(JUR.ProjectName AS TEXT)
FROM JobUsageRecord JUR
JOIN JobUsageRecord_Meta JURM ON JUR.dbid = JURM.dbid
WHERE JUR.dbid >= ?1 AND JUR.dbid < ?2 AND JURM.ProbeName REGEXP ?3
GROUP BY
    JUR.ResourceType,
    JURM.ProbeName,
    JUR.LocalUserId,
    JUR.NodeCount,
    JUR.Processors,
    DATE(JUR.EndTime),
    JUR.MachineName,
    JUR.ProjectName
ORDER BY MAX(JUR.dbid) ASC
"#;

//! Sequence lifecycle conversion.
//!
//! `CREATE | ALTER | DROP SEQUENCE` statements are parsed with nom into a
//! [`SequenceInfo`] and re-rendered in the target's grammar. MySQL has no
//! sequences; there a helper table plus two functions stand in for them.
//! `NEXTVAL`/`CURRVAL` references are rewritten separately.

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{map, map_res, not, opt, peek, recognize, value},
    multi::many0,
    sequence::{pair, preceded, terminated, tuple},
    IResult,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::dialect::Dialect;
use crate::result::{ConversionContext, WarningKind};
use crate::scan::replace_in_code;

const BIGINT_MIN: i128 = i64::MIN as i128;
const BIGINT_MAX: i128 = i64::MAX as i128;

/// A `MINVALUE`/`MAXVALUE` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Value(i128),
    /// `NOMINVALUE`, `NO MAXVALUE`, ...
    Unbounded,
}

/// Options of a sequence; `None` means the statement did not mention it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceInfo {
    pub start_with: Option<i128>,
    pub increment_by: Option<i128>,
    pub min_value: Option<Limit>,
    pub max_value: Option<Limit>,
    /// Cache size; `NOCACHE` is stored as 1.
    pub cache: Option<i128>,
    pub cycle: Option<bool>,
    pub order: Option<bool>,
    /// `RESTART [WITH n]`.
    pub restart: Option<Option<i128>>,
    /// PostgreSQL `AS type`.
    pub data_type: Option<String>,
    /// PostgreSQL `OWNED BY table.column`.
    pub owned_by: Option<String>,
    /// Recognized options without a counterpart elsewhere (`KEEP`, `SCALE`, ...).
    pub ignored: Vec<String>,
}

impl SequenceInfo {
    /// Explicit start, else the engine default: the lower bound of an
    /// ascending sequence, the upper bound of a descending one.
    pub fn start(&self) -> i128 {
        if let Some(start) = self.start_with {
            return start;
        }
        if self.increment() < 0 {
            match self.max_value {
                Some(Limit::Value(max)) => max,
                _ => -1,
            }
        } else {
            match self.min_value {
                Some(Limit::Value(min)) => min,
                _ => 1,
            }
        }
    }

    pub fn increment(&self) -> i128 {
        self.increment_by.unwrap_or(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceStatement {
    Create {
        name: String,
        if_not_exists: bool,
        info: SequenceInfo,
    },
    Alter {
        name: String,
        if_exists: bool,
        info: SequenceInfo,
    },
    Drop {
        name: String,
        if_exists: bool,
        cascade: bool,
    },
}

#[derive(Debug, Clone)]
enum SeqOption {
    Start(i128),
    Increment(i128),
    MinValue(Limit),
    MaxValue(Limit),
    Cache(i128),
    Cycle(bool),
    Order(bool),
    Restart(Option<i128>),
    As(String),
    OwnedBy(String),
    Ignored(String),
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '#'
}

/// Case-insensitive keyword that is not the prefix of a longer word.
fn kw<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag_no_case(word), not(peek(take_while1(is_word_char))))
}

/// `NO X` or `NOX`.
fn negated<'a>(word: &'static str, joined: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    alt((kw(joined), recognize(tuple((kw("NO"), multispace1, kw(word))))))
}

fn number(input: &str) -> IResult<&str, i128> {
    map_res(
        recognize(pair(opt(alt((char('-'), char('+')))), digit1)),
        |s: &str| s.parse::<i128>(),
    )(input)
}

fn spaced_number(input: &str) -> IResult<&str, i128> {
    preceded(multispace0, number)(input)
}

fn object_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| is_word_char(c) || c == '.' || c == '"' || c == '`')(input)
}

fn start_option(input: &str) -> IResult<&str, SeqOption> {
    map(
        preceded(pair(kw("START"), opt(preceded(multispace1, kw("WITH")))), spaced_number),
        SeqOption::Start,
    )(input)
}

fn increment_option(input: &str) -> IResult<&str, SeqOption> {
    map(
        preceded(pair(kw("INCREMENT"), opt(preceded(multispace1, kw("BY")))), spaced_number),
        SeqOption::Increment,
    )(input)
}

fn bound_options(input: &str) -> IResult<&str, SeqOption> {
    alt((
        value(SeqOption::MinValue(Limit::Unbounded), negated("MINVALUE", "NOMINVALUE")),
        value(SeqOption::MaxValue(Limit::Unbounded), negated("MAXVALUE", "NOMAXVALUE")),
        map(preceded(kw("MINVALUE"), spaced_number), |n| SeqOption::MinValue(Limit::Value(n))),
        map(preceded(kw("MAXVALUE"), spaced_number), |n| SeqOption::MaxValue(Limit::Value(n))),
    ))(input)
}

fn flag_options(input: &str) -> IResult<&str, SeqOption> {
    alt((
        value(SeqOption::Cache(1), negated("CACHE", "NOCACHE")),
        map(preceded(kw("CACHE"), spaced_number), SeqOption::Cache),
        value(SeqOption::Cycle(false), negated("CYCLE", "NOCYCLE")),
        value(SeqOption::Cycle(true), kw("CYCLE")),
        value(SeqOption::Order(false), negated("ORDER", "NOORDER")),
        value(SeqOption::Order(true), kw("ORDER")),
    ))(input)
}

fn other_options(input: &str) -> IResult<&str, SeqOption> {
    alt((
        map(
            preceded(kw("RESTART"), opt(preceded(opt(preceded(multispace1, kw("WITH"))), spaced_number))),
            SeqOption::Restart,
        ),
        map(
            preceded(pair(kw("AS"), multispace1), take_while1(is_word_char)),
            |t: &str| SeqOption::As(t.to_string()),
        ),
        map(
            preceded(tuple((kw("OWNED"), multispace1, kw("BY"), multispace1)), object_name),
            |o: &str| SeqOption::OwnedBy(o.to_string()),
        ),
        map(
            alt((
                kw("NOKEEP"),
                kw("KEEP"),
                kw("NOSCALE"),
                kw("SCALE"),
                kw("NOEXTEND"),
                kw("EXTEND"),
                kw("GLOBAL"),
                kw("SESSION"),
                kw("NOSHARD"),
                kw("SHARD"),
            )),
            |w: &str| SeqOption::Ignored(w.to_ascii_uppercase()),
        ),
    ))(input)
}

fn sequence_option(input: &str) -> IResult<&str, SeqOption> {
    alt((start_option, increment_option, bound_options, flag_options, other_options))(input)
}

/// Parse option text into a [`SequenceInfo`]. Returns any text that could
/// not be read as an option.
pub fn parse_sequence_options(input: &str) -> (SequenceInfo, &str) {
    let parsed: IResult<&str, Vec<SeqOption>> = many0(preceded(
        pair(multispace0, opt(char(','))),
        preceded(multispace0, sequence_option),
    ))(input);
    let (rest, options) = match parsed {
        Ok(ok) => ok,
        Err(_) => (input, Vec::new()),
    };

    let mut info = SequenceInfo::default();
    for option in options {
        match option {
            SeqOption::Start(n) => info.start_with = Some(n),
            SeqOption::Increment(n) => info.increment_by = Some(n),
            SeqOption::MinValue(l) => info.min_value = Some(l),
            SeqOption::MaxValue(l) => info.max_value = Some(l),
            SeqOption::Cache(n) => info.cache = Some(n),
            SeqOption::Cycle(c) => info.cycle = Some(c),
            SeqOption::Order(o) => info.order = Some(o),
            SeqOption::Restart(r) => info.restart = Some(r),
            SeqOption::As(t) => info.data_type = Some(t),
            SeqOption::OwnedBy(o) => info.owned_by = Some(o),
            SeqOption::Ignored(w) => info.ignored.push(w),
        }
    }
    (info, rest.trim())
}

fn create_statement(input: &str) -> IResult<&str, (bool, &str)> {
    let (input, _) = tuple((multispace0, kw("CREATE"), multispace1))(input)?;
    let (input, _) = opt(tuple((kw("OR"), multispace1, kw("REPLACE"), multispace1)))(input)?;
    let (input, _) = tuple((kw("SEQUENCE"), multispace1))(input)?;
    let (input, if_not_exists) = opt(tuple((kw("IF"), multispace1, kw("NOT"), multispace1, kw("EXISTS"), multispace1)))(input)?;
    let (input, name) = object_name(input)?;
    Ok((input, (if_not_exists.is_some(), name)))
}

fn alter_or_drop_statement<'a>(verb: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, (bool, &'a str)> {
    move |input: &'a str| {
        let (input, _) = tuple((multispace0, kw(verb), multispace1, kw("SEQUENCE"), multispace1))(input)?;
        let (input, if_exists) = opt(tuple((kw("IF"), multispace1, kw("EXISTS"), multispace1)))(input)?;
        let (input, name) = object_name(input)?;
        Ok((input, (if_exists.is_some(), name)))
    }
}

/// Parse a sequence DDL statement; `None` for anything else.
///
/// The second value is trailing text that was not understood.
pub fn parse_sequence_statement(sql: &str) -> Option<(SequenceStatement, String)> {
    let sql = sql.trim().trim_end_matches(';');
    if let Ok((rest, (if_not_exists, name))) = create_statement(sql) {
        let (info, unparsed) = parse_sequence_options(rest);
        let stmt = SequenceStatement::Create {
            name: name.to_string(),
            if_not_exists,
            info,
        };
        return Some((stmt, unparsed.to_string()));
    }
    if let Ok((rest, (if_exists, name))) = alter_or_drop_statement("ALTER")(sql) {
        let (info, unparsed) = parse_sequence_options(rest);
        let stmt = SequenceStatement::Alter {
            name: name.to_string(),
            if_exists,
            info,
        };
        return Some((stmt, unparsed.to_string()));
    }
    if let Ok((rest, (if_exists, name))) = alter_or_drop_statement("DROP")(sql) {
        let rest = rest.trim();
        let cascade = rest.eq_ignore_ascii_case("CASCADE");
        let unparsed = if cascade || rest.eq_ignore_ascii_case("RESTRICT") {
            ""
        } else {
            rest
        };
        let stmt = SequenceStatement::Drop {
            name: name.to_string(),
            if_exists,
            cascade,
        };
        return Some((stmt, unparsed.to_string()));
    }
    None
}

/// Convert a sequence DDL statement, or return `None` when `sql` is not one.
pub fn convert_sequence_statement(
    sql: &str,
    source: Dialect,
    target: Dialect,
    ctx: &mut ConversionContext,
) -> Option<String> {
    let (stmt, unparsed) = parse_sequence_statement(sql)?;
    debug!(?stmt, %source, %target, "converting sequence statement");
    if !unparsed.is_empty() {
        ctx.warn_with(
            WarningKind::ManualReviewNeeded,
            format!("Unrecognized sequence options: {}", unparsed),
            "Check the options against the target documentation",
        );
    }

    let rendered = match (&stmt, target) {
        (SequenceStatement::Create { name, info, .. }, Dialect::MySql) => emulate_create(name, info, ctx),
        (SequenceStatement::Alter { name, info, .. }, Dialect::MySql) => emulate_alter(name, info, ctx),
        (SequenceStatement::Drop { name, .. }, Dialect::MySql) => {
            ctx.rule("DROP SEQUENCE → drop sequence emulation objects");
            let base = emulation_base(name);
            format!(
                "DROP FUNCTION IF EXISTS {base}_currval;\nDROP FUNCTION IF EXISTS {base}_nextval;\nDROP TABLE IF EXISTS {base}_seq"
            )
        }
        (SequenceStatement::Create { name, if_not_exists, info }, Dialect::PostgreSql) => {
            ctx.rule("CREATE SEQUENCE rendered for PostgreSQL");
            render_postgres("CREATE", name, *if_not_exists, "IF NOT EXISTS", info, true, ctx)
        }
        (SequenceStatement::Alter { name, if_exists, info }, Dialect::PostgreSql) => {
            ctx.rule("ALTER SEQUENCE rendered for PostgreSQL");
            render_postgres("ALTER", name, *if_exists, "IF EXISTS", info, false, ctx)
        }
        (SequenceStatement::Drop { name, if_exists, cascade }, Dialect::PostgreSql) => format!(
            "DROP SEQUENCE {}{}{}",
            if *if_exists { "IF EXISTS " } else { "" },
            name,
            if *cascade { " CASCADE" } else { "" }
        ),
        (SequenceStatement::Create { name, if_not_exists, info }, _) => {
            if *if_not_exists {
                ctx.info(
                    WarningKind::SyntaxDifference,
                    "IF NOT EXISTS removed from CREATE SEQUENCE",
                );
            }
            ctx.rule("CREATE SEQUENCE rendered for Oracle");
            render_oracle("CREATE", name, info, true, ctx)
        }
        (SequenceStatement::Alter { name, if_exists, info }, _) => {
            if *if_exists {
                ctx.info(WarningKind::SyntaxDifference, "IF EXISTS removed from ALTER SEQUENCE");
            }
            ctx.rule("ALTER SEQUENCE rendered for Oracle");
            render_oracle("ALTER", name, info, false, ctx)
        }
        (SequenceStatement::Drop { name, if_exists, cascade }, _) => {
            if *if_exists {
                ctx.warn_with(
                    WarningKind::SyntaxDifference,
                    "DROP SEQUENCE IF EXISTS is not supported; IF EXISTS removed",
                    "Wrap the statement in a PL/SQL block that ignores ORA-02289",
                );
            }
            if *cascade {
                ctx.info(WarningKind::SyntaxDifference, "CASCADE removed from DROP SEQUENCE");
            }
            format!("DROP SEQUENCE {}", name)
        }
    };
    Some(rendered)
}

fn render_oracle(verb: &str, name: &str, info: &SequenceInfo, create: bool, ctx: &mut ConversionContext) -> String {
    let mut parts = vec![format!("{} SEQUENCE {}", verb, name)];
    if create {
        parts.push(format!("START WITH {}", info.start()));
        parts.push(format!("INCREMENT BY {}", info.increment()));
    } else {
        if let Some(restart) = info.restart {
            ctx.info(
                WarningKind::SyntaxDifference,
                "ALTER SEQUENCE ... RESTART requires Oracle 18c or later",
            );
            parts.push(match restart {
                Some(n) => format!("RESTART START WITH {}", n),
                None => "RESTART".to_string(),
            });
        }
        if let Some(n) = info.start_with {
            ctx.warn(
                WarningKind::PartialSupport,
                format!("START WITH cannot be altered; use RESTART START WITH {}", n),
            );
            parts.push(format!("RESTART START WITH {}", n));
        }
        if let Some(n) = info.increment_by {
            parts.push(format!("INCREMENT BY {}", n));
        }
    }
    match info.min_value {
        Some(Limit::Value(n)) => parts.push(format!("MINVALUE {}", n)),
        Some(Limit::Unbounded) => parts.push("NOMINVALUE".to_string()),
        None => {}
    }
    match info.max_value {
        Some(Limit::Value(n)) => parts.push(format!("MAXVALUE {}", n)),
        Some(Limit::Unbounded) => parts.push("NOMAXVALUE".to_string()),
        None => {}
    }
    match info.cache {
        Some(n) if n <= 1 => parts.push("NOCACHE".to_string()),
        Some(n) => parts.push(format!("CACHE {}", n)),
        None => {}
    }
    match info.cycle {
        Some(true) => parts.push("CYCLE".to_string()),
        Some(false) => parts.push("NOCYCLE".to_string()),
        None if create => parts.push("NOCYCLE".to_string()),
        None => {}
    }
    match info.order {
        Some(true) => parts.push("ORDER".to_string()),
        Some(false) => parts.push("NOORDER".to_string()),
        None => {}
    }
    if let Some(data_type) = &info.data_type {
        ctx.info(
            WarningKind::SyntaxDifference,
            format!("Sequence data type {} dropped; Oracle sequences are NUMBER", data_type),
        );
    }
    if let Some(owner) = &info.owned_by {
        ctx.warn(
            WarningKind::PartialSupport,
            format!("OWNED BY {} dropped; the sequence is not removed with its column", owner),
        );
    }
    parts.join(" ")
}

fn clamp_bigint(value: i128, what: &str, ctx: &mut ConversionContext) -> i128 {
    if (BIGINT_MIN..=BIGINT_MAX).contains(&value) {
        return value;
    }
    let clamped = value.clamp(BIGINT_MIN, BIGINT_MAX);
    ctx.warn(
        WarningKind::DataTypeMismatch,
        format!("{} {} exceeds the bigint range; clamped to {}", what, value, clamped),
    );
    clamped
}

fn render_postgres(
    verb: &str,
    name: &str,
    guarded: bool,
    guard: &str,
    info: &SequenceInfo,
    create: bool,
    ctx: &mut ConversionContext,
) -> String {
    let mut parts = vec![format!(
        "{} SEQUENCE {}{}",
        verb,
        if guarded { format!("{} ", guard) } else { String::new() },
        name
    )];
    if let Some(data_type) = &info.data_type {
        parts.push(format!("AS {}", data_type));
    }
    if create {
        let start = clamp_bigint(info.start(), "START WITH", ctx);
        parts.push(format!("START WITH {}", start));
        parts.push(format!("INCREMENT BY {}", info.increment()));
    } else {
        if let Some(n) = info.start_with {
            parts.push(format!("START WITH {}", clamp_bigint(n, "START WITH", ctx)));
        }
        if let Some(n) = info.increment_by {
            parts.push(format!("INCREMENT BY {}", n));
        }
    }
    match info.min_value {
        Some(Limit::Value(n)) => parts.push(format!("MINVALUE {}", clamp_bigint(n, "MINVALUE", ctx))),
        Some(Limit::Unbounded) => parts.push("NO MINVALUE".to_string()),
        None => {}
    }
    match info.max_value {
        Some(Limit::Value(n)) => parts.push(format!("MAXVALUE {}", clamp_bigint(n, "MAXVALUE", ctx))),
        Some(Limit::Unbounded) => parts.push("NO MAXVALUE".to_string()),
        None => {}
    }
    if let Some(n) = info.cache {
        parts.push(format!("CACHE {}", n.max(1)));
    }
    match info.cycle {
        Some(true) => parts.push("CYCLE".to_string()),
        Some(false) => parts.push("NO CYCLE".to_string()),
        None if create => parts.push("NO CYCLE".to_string()),
        None => {}
    }
    if !create {
        match info.restart {
            Some(Some(n)) => parts.push(format!("RESTART WITH {}", n)),
            Some(None) => parts.push("RESTART".to_string()),
            None => {}
        }
    }
    if let Some(owner) = &info.owned_by {
        parts.push(format!("OWNED BY {}", owner));
    }
    if info.order == Some(true) {
        ctx.info(
            WarningKind::PartialSupport,
            "ORDER dropped; PostgreSQL sequences are always ordered within one server",
        );
    }
    parts.join(" ")
}

/// Object-name stem for the MySQL emulation (`<stem>_seq`, `<stem>_nextval`).
pub fn emulation_base(name: &str) -> String {
    name.replace(['"', '`'], "")
}

/// Helper table plus `_nextval()`/`_currval()` functions standing in for a
/// sequence on MySQL.
pub fn emulation_bundle(name: &str, info: &SequenceInfo) -> String {
    let base = emulation_base(name);
    format!(
        "CREATE TABLE {base}_seq (\n    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY\n) ENGINE=InnoDB AUTO_INCREMENT={start};\n\n\
         CREATE FUNCTION {base}_nextval() RETURNS BIGINT\n    NOT DETERMINISTIC MODIFIES SQL DATA\nBEGIN\n    INSERT INTO {base}_seq VALUES (NULL);\n    RETURN LAST_INSERT_ID();\nEND;\n\n\
         CREATE FUNCTION {base}_currval() RETURNS BIGINT\n    NOT DETERMINISTIC READS SQL DATA\nBEGIN\n    RETURN LAST_INSERT_ID();\nEND",
        base = base,
        start = info.start().max(1),
    )
}

fn emulate_create(name: &str, info: &SequenceInfo, ctx: &mut ConversionContext) -> String {
    ctx.rule("CREATE SEQUENCE → AUTO_INCREMENT table + functions");
    ctx.warn_with(
        WarningKind::PartialSupport,
        format!(
            "MySQL has no sequences; {} is emulated with a helper table and functions that are not transaction-equivalent",
            name
        ),
        "Prefer an AUTO_INCREMENT column where the sequence feeds a single table",
    );
    if info.increment() != 1 {
        ctx.warn(
            WarningKind::ManualReviewNeeded,
            format!(
                "INCREMENT BY {} needs auto_increment_increment, which is server-wide",
                info.increment()
            ),
        );
    }
    if info.cycle == Some(true) || matches!(info.max_value, Some(Limit::Value(_))) {
        ctx.warn(
            WarningKind::PartialSupport,
            "MAXVALUE/CYCLE are not enforced by the emulation",
        );
    }
    format!(
        "-- Sequence {} emulation; run with a custom DELIMITER in the mysql client\n{}",
        name,
        emulation_bundle(name, info)
    )
}

fn emulate_alter(name: &str, info: &SequenceInfo, ctx: &mut ConversionContext) -> String {
    let only_restart = info.start_with.is_none()
        && info.increment_by.is_none()
        && info.min_value.is_none()
        && info.max_value.is_none()
        && info.cycle.is_none();
    if let (Some(Some(n)), true) = (info.restart, only_restart) {
        ctx.rule("ALTER SEQUENCE RESTART → ALTER TABLE AUTO_INCREMENT");
        return format!("ALTER TABLE {}_seq AUTO_INCREMENT = {}", emulation_base(name), n);
    }
    ctx.warn_with(
        WarningKind::ManualReviewNeeded,
        format!("ALTER SEQUENCE {} has no MySQL equivalent", name),
        "Adjust the emulation table or functions by hand",
    );
    format!("-- MANUAL CONVERSION REQUIRED: ALTER SEQUENCE {}", name)
}

static ORACLE_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b((?:[a-z_][\w$#]*\.)?[a-z_][\w$#]*)\.(NEXTVAL|CURRVAL)\b").expect("valid sequence pattern")
});

static POSTGRES_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(nextval|currval)\s*\(\s*'([^']+)'(?:\s*::\s*regclass)?\s*\)").expect("valid sequence pattern")
});

static NEXT_VALUE_FOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bNEXT\s+VALUE\s+FOR\s+([a-z_][\w$.]*)").expect("valid sequence pattern"));

static MARIADB_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(NEXTVAL|LASTVAL)\s*\(\s*([a-z_][\w$.]*)\s*\)").expect("valid sequence pattern")
});

static SETVAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bsetval\s*\(").expect("valid sequence pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeqFn {
    Next,
    Current,
}

fn render_reference(name: &str, func: SeqFn, target: Dialect) -> String {
    match (target, func) {
        (Dialect::PostgreSql, SeqFn::Next) => format!("nextval('{}')", name),
        (Dialect::PostgreSql, SeqFn::Current) => format!("currval('{}')", name),
        (Dialect::MySql, SeqFn::Next) => format!("{}_nextval()", emulation_base(name)),
        (Dialect::MySql, SeqFn::Current) => format!("{}_currval()", emulation_base(name)),
        (_, SeqFn::Next) => format!("{}.NEXTVAL", name),
        (_, SeqFn::Current) => format!("{}.CURRVAL", name),
    }
}

/// Rewrite `seq.NEXTVAL`, `nextval('seq')` and `NEXT VALUE FOR seq` for the target.
pub fn convert_sequence_references(
    sql: &str,
    source: Dialect,
    target: Dialect,
    ctx: &mut ConversionContext,
) -> String {
    let mut current = sql.to_string();
    let mut total = 0;

    let (out, n) = replace_in_code(&current, &NEXT_VALUE_FOR_RE, |caps| {
        Some(render_reference(caps.get(1)?.as_str(), SeqFn::Next, target))
    });
    current = out;
    total += n;

    match source.family() {
        Dialect::Oracle if !target.is_oracle_family() => {
            let (out, n) = replace_in_code(&current, &ORACLE_REF_RE, |caps| {
                let func = if caps.get(2)?.as_str().eq_ignore_ascii_case("NEXTVAL") {
                    SeqFn::Next
                } else {
                    SeqFn::Current
                };
                Some(render_reference(caps.get(1)?.as_str(), func, target))
            });
            current = out;
            total += n;
        }
        Dialect::PostgreSql => {
            let (out, n) = replace_in_code(&current, &POSTGRES_REF_RE, |caps| {
                let func = if caps.get(1)?.as_str().eq_ignore_ascii_case("nextval") {
                    SeqFn::Next
                } else {
                    SeqFn::Current
                };
                Some(render_reference(caps.get(2)?.as_str(), func, target))
            });
            current = out;
            total += n;
            if SETVAL_RE.is_match(&current) {
                ctx.warn_with(
                    WarningKind::ManualReviewNeeded,
                    "setval() has no direct equivalent",
                    "Use ALTER SEQUENCE ... RESTART WITH n",
                );
            }
        }
        Dialect::MySql => {
            let (out, n) = replace_in_code(&current, &MARIADB_REF_RE, |caps| {
                let func = if caps.get(1)?.as_str().eq_ignore_ascii_case("NEXTVAL") {
                    SeqFn::Next
                } else {
                    SeqFn::Current
                };
                Some(render_reference(caps.get(2)?.as_str(), func, target))
            });
            current = out;
            total += n;
        }
        _ => {}
    }

    if total > 0 {
        ctx.rule(format!("sequence references → {} syntax", target));
        if target == Dialect::MySql {
            ctx.info(
                WarningKind::PartialSupport,
                "Sequence references call emulation functions; create them with the converted CREATE SEQUENCE",
            );
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn convert(sql: &str, source: Dialect, target: Dialect) -> (String, ConversionContext) {
        let mut ctx = ConversionContext::default();
        let out = convert_sequence_statement(sql, source, target, &mut ctx).unwrap();
        (out, ctx)
    }

    #[test]
    fn test_parse_oracle_options() {
        let (info, rest) = parse_sequence_options(
            " START WITH 100 INCREMENT BY 5 MINVALUE 1 MAXVALUE 9999999999999999999999999999 NOCACHE NOCYCLE ORDER",
        );
        assert_eq!(rest, "");
        assert_eq!(info.start_with, Some(100));
        assert_eq!(info.increment_by, Some(5));
        assert_eq!(info.max_value, Some(Limit::Value(9_999_999_999_999_999_999_999_999_999)));
        assert_eq!(info.cache, Some(1));
        assert_eq!(info.cycle, Some(false));
        assert_eq!(info.order, Some(true));
    }

    #[test]
    fn test_parse_postgres_options() {
        let (info, rest) =
            parse_sequence_options(" AS bigint INCREMENT 2 START 10 NO MAXVALUE CACHE 20 NO CYCLE OWNED BY t.id");
        assert_eq!(rest, "");
        assert_eq!(info.data_type.as_deref(), Some("bigint"));
        assert_eq!(info.max_value, Some(Limit::Unbounded));
        assert_eq!(info.cache, Some(20));
        assert_eq!(info.owned_by.as_deref(), Some("t.id"));
    }

    #[test]
    fn test_unparsed_options_reported() {
        let (info, rest) = parse_sequence_options(" START WITH 1 FROBNICATE");
        assert_eq!(info.start_with, Some(1));
        assert_eq!(rest, "FROBNICATE");
    }

    #[test]
    fn test_oracle_to_postgres_create() {
        let (out, ctx) = convert(
            "CREATE SEQUENCE emp_seq START WITH 1 INCREMENT BY 1 MAXVALUE 9999999999999999999999999999 NOCACHE",
            Dialect::Oracle,
            Dialect::PostgreSql,
        );
        assert_eq!(
            out,
            "CREATE SEQUENCE emp_seq START WITH 1 INCREMENT BY 1 MAXVALUE 9223372036854775807 CACHE 1 NO CYCLE"
        );
        assert!(ctx.warnings.iter().any(|w| w.kind == WarningKind::DataTypeMismatch));
    }

    #[test]
    fn test_postgres_to_oracle_create() {
        let (out, ctx) = convert(
            "CREATE SEQUENCE IF NOT EXISTS s AS integer START 5 CACHE 1",
            Dialect::PostgreSql,
            Dialect::Tibero,
        );
        assert_eq!(out, "CREATE SEQUENCE s START WITH 5 INCREMENT BY 1 NOCACHE NOCYCLE");
        assert_eq!(ctx.warnings.len(), 2);
    }

    #[test]
    fn test_mysql_emulation() {
        let (out, ctx) = convert("CREATE SEQUENCE order_seq START WITH 1000", Dialect::Oracle, Dialect::MySql);
        assert!(out.contains("CREATE TABLE order_seq_seq"));
        assert!(out.contains("AUTO_INCREMENT=1000"));
        assert!(out.contains("CREATE FUNCTION order_seq_nextval()"));
        assert!(out.contains("CREATE FUNCTION order_seq_currval()"));
        assert!(ctx.warnings.iter().any(|w| w.kind == WarningKind::PartialSupport));

        let (out, _) = convert("DROP SEQUENCE order_seq", Dialect::Oracle, Dialect::MySql);
        assert!(out.ends_with("DROP TABLE IF EXISTS order_seq_seq"));
    }

    #[test]
    fn test_drop_if_exists_to_oracle() {
        let (out, ctx) = convert("DROP SEQUENCE IF EXISTS s CASCADE", Dialect::PostgreSql, Dialect::Oracle);
        assert_eq!(out, "DROP SEQUENCE s");
        assert_eq!(ctx.warnings[0].kind, WarningKind::SyntaxDifference);
    }

    #[test]
    fn test_descending_default_start() {
        let (out, _) = convert("CREATE SEQUENCE s INCREMENT BY -1", Dialect::Oracle, Dialect::PostgreSql);
        assert_eq!(out, "CREATE SEQUENCE s START WITH -1 INCREMENT BY -1 NO CYCLE");

        let (out, _) = convert("CREATE SEQUENCE s INCREMENT BY -1", Dialect::PostgreSql, Dialect::Oracle);
        assert_eq!(out, "CREATE SEQUENCE s START WITH -1 INCREMENT BY -1 NOCYCLE");

        let (out, _) = convert(
            "CREATE SEQUENCE s INCREMENT BY -5 MAXVALUE 100",
            Dialect::Oracle,
            Dialect::PostgreSql,
        );
        assert!(out.starts_with("CREATE SEQUENCE s START WITH 100 INCREMENT BY -5 MAXVALUE 100"));

        let (out, _) = convert("CREATE SEQUENCE s MINVALUE 10", Dialect::PostgreSql, Dialect::Oracle);
        assert!(out.starts_with("CREATE SEQUENCE s START WITH 10 INCREMENT BY 1 MINVALUE 10"));
    }

    #[test]
    fn test_alter_restart() {
        let (out, _) = convert("ALTER SEQUENCE s RESTART WITH 50", Dialect::PostgreSql, Dialect::MySql);
        assert_eq!(out, "ALTER TABLE s_seq AUTO_INCREMENT = 50");
        let (out, _) = convert("ALTER SEQUENCE s INCREMENT BY 10", Dialect::Oracle, Dialect::PostgreSql);
        assert_eq!(out, "ALTER SEQUENCE s INCREMENT BY 10");
    }

    #[test]
    fn test_not_a_sequence() {
        let mut ctx = ConversionContext::default();
        assert!(convert_sequence_statement("CREATE TABLE t (a INT)", Dialect::Oracle, Dialect::MySql, &mut ctx).is_none());
    }

    #[test]
    fn test_references() {
        let mut ctx = ConversionContext::default();
        let out = convert_sequence_references(
            "INSERT INTO t VALUES (emp_seq.NEXTVAL, hr.s.currval, 'x.NEXTVAL')",
            Dialect::Oracle,
            Dialect::PostgreSql,
            &mut ctx,
        );
        assert_eq!(out, "INSERT INTO t VALUES (nextval('emp_seq'), currval('hr.s'), 'x.NEXTVAL')");

        let out = convert_sequence_references(
            "SELECT nextval('s'::regclass)",
            Dialect::PostgreSql,
            Dialect::Oracle,
            &mut ctx,
        );
        assert_eq!(out, "SELECT s.NEXTVAL");

        let out = convert_sequence_references("SELECT s.NEXTVAL FROM dual", Dialect::Oracle, Dialect::MySql, &mut ctx);
        assert_eq!(out, "SELECT s_nextval() FROM dual");
    }
}

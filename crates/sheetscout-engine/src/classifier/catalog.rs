//! Known worksheet functions grouped by how hard they are to re-implement.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionFamily {
    Aggregate,
    Scalar,
    Lookup,
    Conditional,
    DynamicArray,
    Volatile,
    /// Reaches outside the workbook: web services, RTD servers, DLL calls, OLAP cubes.
    Environment,
}

const AGGREGATE: &[&str] = &[
    "SUM", "AVERAGE", "AVERAGEA", "COUNT", "COUNTA", "COUNTBLANK", "MIN", "MAX", "MINA", "MAXA",
    "PRODUCT", "SUBTOTAL", "AGGREGATE", "MEDIAN", "MODE", "MODE.SNGL", "STDEV", "STDEV.S",
    "STDEV.P", "STDEVA", "VAR", "VAR.S", "VAR.P", "SUMPRODUCT", "SUMSQ", "LARGE", "SMALL", "RANK",
    "RANK.EQ", "RANK.AVG", "PERCENTILE", "PERCENTILE.INC", "PERCENTILE.EXC", "QUARTILE",
    "QUARTILE.INC", "CORREL", "FORECAST", "FORECAST.LINEAR", "SLOPE", "INTERCEPT", "GROWTH",
    "TREND",
];

const SCALAR: &[&str] = &[
    "ROUND", "ROUNDUP", "ROUNDDOWN", "MROUND", "INT", "ABS", "MOD", "POWER", "SQRT", "EXP", "LN",
    "LOG", "LOG10", "CEILING", "CEILING.MATH", "FLOOR", "FLOOR.MATH", "TRUNC", "SIGN", "PI",
    "CONCATENATE", "CONCAT", "TEXTJOIN", "LEFT", "RIGHT", "MID", "LEN", "TRIM", "CLEAN", "UPPER",
    "LOWER", "PROPER", "TEXT", "VALUE", "NUMBERVALUE", "SUBSTITUTE", "REPLACE", "FIND", "SEARCH",
    "REPT", "EXACT", "CHAR", "CODE", "FIXED", "DOLLAR", "DATE", "YEAR", "MONTH", "DAY", "HOUR",
    "MINUTE", "SECOND", "TIME", "EDATE", "EOMONTH", "DATEDIF", "DATEVALUE", "TIMEVALUE",
    "WEEKDAY", "WEEKNUM", "ISOWEEKNUM", "NETWORKDAYS", "WORKDAY", "YEARFRAC", "DAYS", "DAYS360",
    "PMT", "IPMT", "PPMT", "FV", "PV", "NPV", "XNPV", "IRR", "XIRR", "RATE", "NPER", "ISBLANK",
    "ISNUMBER", "ISTEXT", "ISERROR", "ISERR", "ISNA", "ISLOGICAL", "ISEVEN", "ISODD", "N", "T",
    "NA", "ROW", "COLUMN", "ROWS", "COLUMNS", "HYPERLINK", "TRUE", "FALSE",
];

const LOOKUP: &[&str] = &[
    "VLOOKUP", "HLOOKUP", "LOOKUP", "INDEX", "MATCH", "XLOOKUP", "XMATCH", "CHOOSE", "ADDRESS",
    "GETPIVOTDATA", "AREAS",
];

const CONDITIONAL: &[&str] = &[
    "IF", "IFS", "IFERROR", "IFNA", "AND", "OR", "NOT", "XOR", "SWITCH", "SUMIF", "SUMIFS",
    "COUNTIF", "COUNTIFS", "AVERAGEIF", "AVERAGEIFS", "MAXIFS", "MINIFS", "DSUM", "DCOUNT",
    "DAVERAGE", "DGET",
];

const DYNAMIC_ARRAY: &[&str] = &[
    "FILTER", "SORT", "SORTBY", "UNIQUE", "SEQUENCE", "LET", "LAMBDA", "MAP", "REDUCE", "SCAN",
    "BYROW", "BYCOL", "MAKEARRAY", "VSTACK", "HSTACK", "TOCOL", "TOROW", "WRAPROWS", "WRAPCOLS",
    "TAKE", "DROP", "CHOOSECOLS", "CHOOSEROWS", "EXPAND", "TEXTSPLIT", "TRANSPOSE", "MMULT",
    "MINVERSE", "FREQUENCY",
];

const VOLATILE: &[&str] = &[
    "NOW", "TODAY", "RAND", "RANDBETWEEN", "RANDARRAY", "OFFSET", "INDIRECT", "CELL", "INFO",
];

const ENVIRONMENT: &[&str] = &[
    "WEBSERVICE", "RTD", "CALL", "REGISTER", "REGISTER.ID", "RUN", "EXECUTE", "SQL.REQUEST",
];

/// Functions that invoke code outside the formula language.
const MACRO_CALLS: &[&str] = &["CALL", "REGISTER", "REGISTER.ID", "RUN", "EXECUTE"];

static FAMILIES: Lazy<FxHashMap<&'static str, FunctionFamily>> = Lazy::new(|| {
    let groups: [(&[&str], FunctionFamily); 7] = [
        (AGGREGATE, FunctionFamily::Aggregate),
        (SCALAR, FunctionFamily::Scalar),
        (LOOKUP, FunctionFamily::Lookup),
        (CONDITIONAL, FunctionFamily::Conditional),
        (DYNAMIC_ARRAY, FunctionFamily::DynamicArray),
        (VOLATILE, FunctionFamily::Volatile),
        (ENVIRONMENT, FunctionFamily::Environment),
    ];
    let mut map = FxHashMap::default();
    for (names, family) in groups {
        for name in names {
            map.insert(*name, family);
        }
    }
    map
});

/// Upper-case `name` and drop the `_xlfn.` / `_xlws.` storage prefixes.
pub fn normalize_function_name(name: &str) -> String {
    let mut upper = name.trim().trim_start_matches('@').to_ascii_uppercase();
    loop {
        if let Some(rest) = upper.strip_prefix("_XLFN.") {
            upper = rest.to_string();
        } else if let Some(rest) = upper.strip_prefix("_XLWS.") {
            upper = rest.to_string();
        } else {
            return upper;
        }
    }
}

/// Family of a normalized function name; `None` for unknown or
/// user-defined functions.
pub fn family_of(name: &str) -> Option<FunctionFamily> {
    if name.starts_with("CUBE") {
        return Some(FunctionFamily::Environment);
    }
    FAMILIES.get(name).copied()
}

pub fn is_macro_call(name: &str) -> bool {
    MACRO_CALLS.contains(&name)
}

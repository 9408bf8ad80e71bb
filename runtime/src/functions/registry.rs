use phf::phf_map;

use crate::functions::histogram::histogram_quantile;
use crate::functions::over_time::*;
use crate::functions::rate::*;
use crate::functions::transform::*;
use crate::functions::{Function, FunctionImpl};
use crate::types::ValueType;

const SCALAR: ValueType = ValueType::Scalar;
const VECTOR: ValueType = ValueType::Vector;
const MATRIX: ValueType = ValueType::Matrix;

macro_rules! range_fn {
    ($name: literal, $f: expr) => {
        Function {
            name: $name,
            arg_types: &[MATRIX],
            return_type: VECTOR,
            implementation: FunctionImpl::Range($f),
        }
    };
}

macro_rules! math_fn {
    ($name: literal, $f: expr) => {
        Function {
            name: $name,
            arg_types: &[VECTOR],
            return_type: VECTOR,
            implementation: FunctionImpl::Instant($f),
        }
    };
}

static FUNCTIONS: phf::Map<&'static str, Function> = phf_map! {
    // rates
    "rate" => range_fn!("rate", rate),
    "increase" => range_fn!("increase", increase),
    "delta" => range_fn!("delta", delta),
    "irate" => range_fn!("irate", irate),
    "idelta" => range_fn!("idelta", idelta),

    // _over_time
    "avg_over_time" => range_fn!("avg_over_time", avg_over_time),
    "count_over_time" => range_fn!("count_over_time", count_over_time),
    "last_over_time" => range_fn!("last_over_time", last_over_time),
    "max_over_time" => range_fn!("max_over_time", max_over_time),
    "min_over_time" => range_fn!("min_over_time", min_over_time),
    "present_over_time" => range_fn!("present_over_time", present_over_time),
    "stddev_over_time" => range_fn!("stddev_over_time", stddev_over_time),
    "stdvar_over_time" => range_fn!("stdvar_over_time", stdvar_over_time),
    "sum_over_time" => range_fn!("sum_over_time", sum_over_time),
    "quantile_over_time" => Function {
        name: "quantile_over_time",
        arg_types: &[SCALAR, MATRIX],
        return_type: VECTOR,
        implementation: FunctionImpl::Range(quantile_over_time),
    },
    "absent_over_time" => Function {
        name: "absent_over_time",
        arg_types: &[MATRIX],
        return_type: VECTOR,
        implementation: FunctionImpl::AbsentOverTime,
    },

    // math
    "abs" => math_fn!("abs", abs),
    "ceil" => math_fn!("ceil", ceil),
    "exp" => math_fn!("exp", exp),
    "floor" => math_fn!("floor", floor),
    "ln" => math_fn!("ln", ln),
    "log10" => math_fn!("log10", log10),
    "log2" => math_fn!("log2", log2),
    "sgn" => math_fn!("sgn", sgn),
    "sqrt" => math_fn!("sqrt", sqrt),

    "absent" => math_fn!("absent", absent),
    "sort" => math_fn!("sort", sort),
    "sort_desc" => math_fn!("sort_desc", sort_desc),
    "histogram_quantile" => Function {
        name: "histogram_quantile",
        arg_types: &[SCALAR, VECTOR],
        return_type: VECTOR,
        implementation: FunctionImpl::Instant(histogram_quantile),
    },
    "scalar" => Function {
        name: "scalar",
        arg_types: &[VECTOR],
        return_type: SCALAR,
        implementation: FunctionImpl::Instant(scalar),
    },
    "vector" => Function {
        name: "vector",
        arg_types: &[SCALAR],
        return_type: VECTOR,
        implementation: FunctionImpl::Instant(vector),
    },
    "time" => Function {
        name: "time",
        arg_types: &[],
        return_type: SCALAR,
        implementation: FunctionImpl::Instant(time),
    },
};

/// Looks up a built-in function by its (case sensitive) name.
pub fn get_function(name: &str) -> Option<&'static Function> {
    FUNCTIONS.get(name)
}

pub fn function_names() -> impl Iterator<Item = &'static str> {
    FUNCTIONS.keys().copied()
}

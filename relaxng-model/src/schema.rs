//! The compact JSON schema loader.
//!
//! Encoding: `{"v":3,"o":<flags>,"d":<array>}`. `d` is a flat array of
//! tagged-constructor pattern nodes; `[tag, ...args, xml_path]`. Name
//! classes are nested tagged values rather than flat array entries -- they
//! never participate in the Ref/Define cycle, so there's no need to index
//! them. Two keys beyond the three named explicitly: `"start"` (the index
//! of the grammar's start pattern) and `"defines"` (an object mapping
//! define name to the index of its body, always an `Element` per the
//! simplifier's invariant). A grammar can't be reconstructed without these,
//! so they're assumed present. `"o"` (the flags field) is read and stored
//! but not currently interpreted -- no flag semantics are defined yet, so
//! it's round-tripped opaquely via [`Grammar::options`] for forward
//! compatibility with a future producer.

use crate::datatype::{DatatypeId, Registry};
use crate::error::SchemaError;
use crate::name_class::NameClass;
use crate::pattern::{Define, Grammar, PatternNode};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

const SUPPORTED_VERSION: i64 = 3;

pub fn load(json: &str) -> Result<Grammar, SchemaError> {
    let root: Value =
        serde_json::from_str(json).map_err(|e| SchemaError::Malformed(e.to_string()))?;
    load_value(&root)
}

pub fn load_value(root: &Value) -> Result<Grammar, SchemaError> {
    let obj = root
        .as_object()
        .ok_or_else(|| SchemaError::Malformed("schema root is not an object".to_string()))?;

    let version = obj
        .get("v")
        .and_then(Value::as_i64)
        .ok_or_else(|| SchemaError::Malformed("missing \"v\" version field".to_string()))?;
    if version != SUPPORTED_VERSION {
        return Err(SchemaError::UnsupportedVersion(version));
    }
    let options = obj.get("o").and_then(Value::as_i64).unwrap_or(0);

    let d = obj
        .get("d")
        .and_then(Value::as_array)
        .ok_or_else(|| SchemaError::Malformed("missing \"d\" node array".to_string()))?;

    let start_idx = obj
        .get("start")
        .and_then(Value::as_u64)
        .ok_or_else(|| SchemaError::Malformed("missing \"start\" index".to_string()))?;

    let define_indices: HashMap<String, u64> = obj
        .get("defines")
        .and_then(Value::as_object)
        .ok_or_else(|| SchemaError::Malformed("missing \"defines\" object".to_string()))?
        .iter()
        .map(|(name, idx)| {
            idx.as_u64()
                .map(|i| (name.clone(), i))
                .ok_or_else(|| SchemaError::Malformed(format!("defines[{name:?}] is not an index")))
        })
        .collect::<Result<_, _>>()?;

    let defines: HashMap<String, Rc<Define>> = define_indices
        .keys()
        .map(|name| (name.clone(), Define::new(name.clone())))
        .collect();

    let mut builder = Builder {
        nodes: d,
        defines: &defines,
        registry: Registry::default(),
        cache: vec![None; d.len()],
        missing_refs: RefCell::new(HashSet::new()),
    };

    for (name, idx) in &define_indices {
        let content = builder.build(*idx as usize)?;
        defines[name].set_content(content);
    }

    let start = builder.build(start_idx as usize)?;

    let missing = builder.missing_refs.into_inner();
    if !missing.is_empty() {
        let mut names: Vec<String> = missing.into_iter().collect();
        names.sort();
        return Err(SchemaError::UnresolvedReference(names));
    }

    let mut grammar = Grammar::new(start, defines);
    grammar.options = options;
    Ok(grammar)
}

struct Builder<'a> {
    nodes: &'a [Value],
    defines: &'a HashMap<String, Rc<Define>>,
    registry: Registry,
    cache: Vec<Option<Rc<PatternNode>>>,
    missing_refs: RefCell<HashSet<String>>,
}

impl<'a> Builder<'a> {
    fn build(&mut self, index: usize) -> Result<Rc<PatternNode>, SchemaError> {
        if let Some(existing) = self.cache.get(index).and_then(Clone::clone) {
            return Ok(existing);
        }
        let node = self
            .nodes
            .get(index)
            .ok_or_else(|| SchemaError::Malformed(format!("node index {index} out of range")))?;
        let built = self.build_node(node)?;
        self.cache[index] = Some(built.clone());
        Ok(built)
    }

    fn build_node(&mut self, node: &Value) -> Result<Rc<PatternNode>, SchemaError> {
        let arr = node
            .as_array()
            .ok_or_else(|| SchemaError::Malformed("node is not an array".to_string()))?;
        let tag = arr
            .first()
            .and_then(Value::as_i64)
            .ok_or_else(|| SchemaError::Malformed("node missing tag".to_string()))?;
        let path = arr
            .last()
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        match tag {
            0 => Ok(PatternNode::empty(path)),
            1 => Ok(PatternNode::not_allowed(path)),
            2 => Ok(PatternNode::text(path)),
            3 => {
                // [3, library, localName, value, ns, xml_path]
                let library = str_arg(arr, 1)?;
                let local_name = str_arg(arr, 2)?;
                let value = str_arg(arr, 3)?;
                let ns = str_arg(arr, 4)?;
                let datatype = self
                    .registry
                    .build(&DatatypeId::new(library, local_name), &[])?;
                Ok(PatternNode::value(datatype, value.to_string(), ns.to_string(), path))
            }
            4 => {
                // [4, library, localName, params, exceptIndexOrNull, xml_path]
                let library = str_arg(arr, 1)?;
                let local_name = str_arg(arr, 2)?;
                let params = parse_params(arr.get(3))?;
                let datatype = self
                    .registry
                    .build(&DatatypeId::new(library, local_name), &params)?;
                let except = match arr.get(4) {
                    Some(Value::Null) | None => None,
                    Some(idx) => {
                        let idx = idx.as_u64().ok_or_else(|| {
                            SchemaError::Malformed("Data except is not an index".to_string())
                        })?;
                        Some(self.build(idx as usize)?)
                    }
                };
                Ok(PatternNode::data(datatype, except, path))
            }
            5 => {
                let content = self.build(index_arg(arr, 1)?)?;
                Ok(PatternNode::list(content, path))
            }
            6 => {
                let name = build_name_class(
                    arr.get(1)
                        .ok_or_else(|| SchemaError::Malformed("Attribute missing name class".to_string()))?,
                )?;
                let content = self.build(index_arg(arr, 2)?)?;
                Ok(PatternNode::attribute(name, content, path))
            }
            7 => {
                let name = build_name_class(
                    arr.get(1)
                        .ok_or_else(|| SchemaError::Malformed("Element missing name class".to_string()))?,
                )?;
                let content = self.build(index_arg(arr, 2)?)?;
                Ok(PatternNode::element(name, content, path))
            }
            8 => {
                let name = str_arg(arr, 1)?.to_string();
                let define = match self.defines.get(&name) {
                    Some(d) => d.clone(),
                    None => {
                        self.missing_refs.borrow_mut().insert(name.clone());
                        // A placeholder define lets construction proceed
                        // so the rest of the grammar can still be built;
                        // the caller reports `UnresolvedReference` before
                        // the result is ever used.
                        Define::new(name)
                    }
                };
                Ok(PatternNode::reference(define, path))
            }
            9 => {
                let a = self.build(index_arg(arr, 1)?)?;
                let b = self.build(index_arg(arr, 2)?)?;
                Ok(PatternNode::group(a, b, path))
            }
            10 => {
                let a = self.build(index_arg(arr, 1)?)?;
                let b = self.build(index_arg(arr, 2)?)?;
                Ok(PatternNode::choice(a, b, path))
            }
            11 => {
                let a = self.build(index_arg(arr, 1)?)?;
                let b = self.build(index_arg(arr, 2)?)?;
                Ok(PatternNode::interleave(a, b, path))
            }
            12 => {
                let content = self.build(index_arg(arr, 1)?)?;
                Ok(PatternNode::one_or_more(content, path))
            }
            other => Err(SchemaError::Malformed(format!("unknown pattern tag {other}"))),
        }
    }
}

fn str_arg<'a>(arr: &'a [Value], i: usize) -> Result<&'a str, SchemaError> {
    arr.get(i)
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::Malformed(format!("expected string arg at position {i}")))
}

fn index_arg(arr: &[Value], i: usize) -> Result<usize, SchemaError> {
    arr.get(i)
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .ok_or_else(|| SchemaError::Malformed(format!("expected index arg at position {i}")))
}

fn parse_params(value: Option<&Value>) -> Result<Vec<(String, String)>, SchemaError> {
    let Some(value) = value else { return Ok(Vec::new()) };
    let Some(arr) = value.as_array() else {
        if value.is_null() {
            return Ok(Vec::new());
        }
        return Err(SchemaError::Malformed("params is not an array".to_string()));
    };
    arr.iter()
        .map(|pair| {
            let pair = pair
                .as_array()
                .ok_or_else(|| SchemaError::Malformed("param entry is not an array".to_string()))?;
            let name = str_arg(pair, 0)?.to_string();
            let value = str_arg(pair, 1)?.to_string();
            Ok((name, value))
        })
        .collect()
}

fn build_name_class(value: &Value) -> Result<NameClass, SchemaError> {
    let arr = value
        .as_array()
        .ok_or_else(|| SchemaError::Malformed("name class is not an array".to_string()))?;
    let tag = arr
        .first()
        .and_then(Value::as_i64)
        .ok_or_else(|| SchemaError::Malformed("name class missing tag".to_string()))?;
    match tag {
        0 => Ok(NameClass::Name {
            namespace_uri: str_arg(arr, 1)?.to_string(),
            local_name: str_arg(arr, 2)?.to_string(),
        }),
        1 => Ok(NameClass::NsName {
            namespace_uri: str_arg(arr, 1)?.to_string(),
            except: build_optional_name_class(arr.get(2))?,
        }),
        2 => Ok(NameClass::AnyName {
            except: build_optional_name_class(arr.get(1))?,
        }),
        3 => Ok(NameClass::NameChoice {
            a: Box::new(build_name_class(
                arr.get(1)
                    .ok_or_else(|| SchemaError::Malformed("NameChoice missing a".to_string()))?,
            )?),
            b: Box::new(build_name_class(
                arr.get(2)
                    .ok_or_else(|| SchemaError::Malformed("NameChoice missing b".to_string()))?,
            )?),
        }),
        other => Err(SchemaError::Malformed(format!("unknown name class tag {other}"))),
    }
}

fn build_optional_name_class(value: Option<&Value>) -> Result<Option<Box<NameClass>>, SchemaError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => Ok(Some(Box::new(build_name_class(v)?))),
    }
}

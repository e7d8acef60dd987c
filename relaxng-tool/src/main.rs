//! `rng`: a thin CLI wrapper driving the engine end to end. Reads a compact
//! JSON schema (the format `relaxng_model::schema::load` understands) and
//! validates one or more XML documents against it, bridging `xmlparser`
//! tokens into `relaxng_validator::Event`s and reporting failures with
//! `codemap`/`codemap-diagnostic`.

use relaxng_validator::{Event, GrammarWalker};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::process::exit;
use std::rc::Rc;
use structopt::StructOpt;
use xmlparser::{ElementEnd, StrSpan, Token, Tokenizer};

#[derive(Debug, StructOpt)]
#[structopt(name = "rng", about = "Validate XML documents against a Relax NG schema")]
struct Cli {
    #[structopt(long)]
    verbose: bool,
    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    Validate { schema: PathBuf, xml: Vec<PathBuf> },
}

fn main() {
    let cli = Cli::from_args();
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::init();
    }
    match cli.cmd {
        Command::Validate { schema, xml } => validate(schema, xml),
    }
}

fn validate(schema_path: PathBuf, xmls: Vec<PathBuf>) {
    let mut schema_text = String::new();
    File::open(&schema_path)
        .and_then(|mut f| f.read_to_string(&mut schema_text))
        .unwrap_or_else(|e| {
            eprintln!("reading {}: {e}", schema_path.display());
            exit(1);
        });
    let grammar = match relaxng_model::schema::load(&schema_text) {
        Ok(g) => Rc::new(g),
        Err(e) => {
            eprintln!("loading {}: {e}", schema_path.display());
            exit(1);
        }
    };

    let mut failed = false;
    for xml in xmls {
        let mut doc = String::new();
        if let Err(e) = File::open(&xml).and_then(|mut f| f.read_to_string(&mut doc)) {
            eprintln!("reading {}: {e}", xml.display());
            failed = true;
            continue;
        }
        eprintln!("Validating {}", xml.display());
        let errors = validate_document(grammar.clone(), &doc);
        if !errors.is_empty() {
            failed = true;
            let mut map = codemap::CodeMap::new();
            let file = map.add_file(xml.to_string_lossy().to_string(), doc.clone());
            let mut diagnostics = Vec::new();
            for (span, message) in errors {
                let label = codemap_diagnostic::SpanLabel {
                    span: file.span.subspan(span.start() as u64, span.end() as u64),
                    label: None,
                    style: codemap_diagnostic::SpanStyle::Primary,
                };
                diagnostics.push(codemap_diagnostic::Diagnostic {
                    level: codemap_diagnostic::Level::Error,
                    message,
                    code: None,
                    spans: vec![label],
                });
            }
            let mut emitter = codemap_diagnostic::Emitter::stderr(codemap_diagnostic::ColorConfig::Auto, Some(&map));
            emitter.emit(&diagnostics);
        }
    }
    if failed {
        exit(2);
    }
}

/// One in-progress start tag: the raw attributes collected between
/// `ElementStart` and the tag's closing `ElementEnd`, resolved against the
/// resolver's scope once the tag closes (so an attribute appearing before
/// its own `xmlns:p=...` declaration on the same start tag still resolves).
struct PendingStartTag<'a> {
    ns: String,
    local: String,
    attrs: Vec<(StrSpan<'a>, StrSpan<'a>, StrSpan<'a>)>,
}

fn qname(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{prefix}:{local}")
    }
}

/// Drives `doc`'s token stream through `grammar`, returning `(span,
/// message)` pairs for every reported error plus anything `end()` surfaces
/// for an unterminated document.
fn validate_document(grammar: Rc<relaxng_model::Grammar>, doc: &str) -> Vec<(std::ops::Range<usize>, String)> {
    let mut gw = GrammarWalker::new(grammar);
    let mut out = Vec::new();
    let mut pending: Option<PendingStartTag> = None;

    let report = |out: &mut Vec<(std::ops::Range<usize>, String)>, span: std::ops::Range<usize>, errs: Vec<relaxng_validator::ValidationError>| {
        for err in errs {
            out.push((span.clone(), err.to_string()));
        }
    };

    for token in Tokenizer::from(doc) {
        let token = match token {
            Ok(t) => t,
            Err(e) => {
                out.push((0..doc.len(), format!("XML parse error: {e}")));
                break;
            }
        };
        match token {
            Token::ElementStart { prefix, local, .. } => {
                gw.fire_event(Event::EnterContext);
                pending = Some(PendingStartTag {
                    ns: prefix.as_str().to_string(),
                    local: local.as_str().to_string(),
                    attrs: Vec::new(),
                });
            }
            Token::Attribute { prefix, local, value, .. } => {
                if let Some(p) = pending.as_mut() {
                    p.attrs.push((prefix, local, value));
                }
            }
            Token::ElementEnd { end, span } => match end {
                ElementEnd::Open | ElementEnd::Empty => {
                    let p = pending.take().expect("ElementStart always precedes ElementEnd");
                    let mut attributes = Vec::new();
                    for (aprefix, alocal, avalue) in &p.attrs {
                        let aprefix = aprefix.as_str();
                        let alocal = alocal.as_str();
                        if aprefix.is_empty() && alocal == "xmlns" {
                            gw.fire_event(Event::DefinePrefix {
                                prefix: String::new(),
                                uri: avalue.as_str().to_string(),
                            });
                        } else if aprefix == "xmlns" {
                            gw.fire_event(Event::DefinePrefix {
                                prefix: alocal.to_string(),
                                uri: avalue.as_str().to_string(),
                            });
                        } else {
                            attributes.push((aprefix.to_string(), alocal.to_string(), avalue.as_str().to_string()));
                        }
                    }
                    let element_qname = qname(&p.ns, &p.local);
                    let Some((ns, local)) = gw.resolve_name(&element_qname, false) else {
                        out.push((span.start()..span.end(), format!("undefined namespace prefix in <{element_qname}>")));
                        continue;
                    };
                    let mut resolved_attrs = Vec::new();
                    for (aprefix, alocal, avalue) in &attributes {
                        let aqname = qname(aprefix, alocal);
                        match gw.resolve_name(&aqname, true) {
                            Some((ans, alocal)) => resolved_attrs.push((ans, alocal, avalue.clone())),
                            None => out.push((span.start()..span.end(), format!("undefined namespace prefix on attribute {aqname}"))),
                        }
                    }
                    let bound_name = (ns.clone(), local.clone());
                    match gw.fire_event(Event::StartTagAndAttributes {
                        ns,
                        local,
                        attributes: resolved_attrs,
                    }) {
                        relaxng_validator::FireResult::Matched(errs) => report(&mut out, span.start()..span.end(), errs),
                        relaxng_validator::FireResult::NoMatch => {
                            out.push((span.start()..span.end(), "element not allowed here".to_string()))
                        }
                    }
                    if end == ElementEnd::Empty {
                        end_element(&mut gw, &mut out, &bound_name, span.start()..span.end());
                        gw.fire_event(Event::LeaveContext);
                    }
                }
                ElementEnd::Close(eprefix, elocal) => {
                    let eqname = qname(eprefix.as_str(), elocal.as_str());
                    match gw.resolve_name(&eqname, false) {
                        Some((ns, local)) => {
                            let fr = gw.fire_event(Event::end_tag(ns, local));
                            if let relaxng_validator::FireResult::Matched(errs) = fr {
                                report(&mut out, span.start()..span.end(), errs);
                            }
                        }
                        None => out.push((span.start()..span.end(), format!("undefined namespace prefix in </{eqname}>"))),
                    }
                    gw.fire_event(Event::LeaveContext);
                }
            },
            Token::Text { text } => {
                if !text.as_str().is_empty() {
                    gw.fire_event(Event::text(text.as_str()));
                }
            }
            Token::Cdata { text, .. } => {
                if !text.as_str().is_empty() {
                    gw.fire_event(Event::text(text.as_str()));
                }
            }
            Token::Comment { .. } | Token::ProcessingInstruction { .. } | Token::Declaration { .. } => {}
            _ => {}
        }
    }

    for err in gw.end() {
        out.push((0..doc.len(), err.to_string()));
    }
    out
}

/// Fires the synthetic `endTag` a self-closing `<name/>` implies, using the
/// element's already-resolved bound name.
fn end_element(
    gw: &mut GrammarWalker,
    out: &mut Vec<(std::ops::Range<usize>, String)>,
    bound_name: &(String, String),
    span: std::ops::Range<usize>,
) {
    if let relaxng_validator::FireResult::Matched(errs) =
        gw.fire_event(Event::EndTag { ns: bound_name.0.clone(), local: bound_name.1.clone() })
    {
        for err in errs {
            out.push((span.clone(), err.to_string()));
        }
    }
}

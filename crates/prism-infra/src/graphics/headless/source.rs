// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A minimal GLSL scanner used to emulate active uniform and attribute queries.
//!
//! Only what a driver would report matters here: declarations inside
//! preprocessor blocks that are disabled by the prelude's `#define`s are not
//! active, exactly like uniforms optimized out by a real compiler.

use std::collections::HashSet;

/// Names declared with `uniform` and (for vertex sources) `in`.
#[derive(Debug, Default)]
pub(crate) struct Declarations {
    pub uniforms: Vec<String>,
    pub attributes: Vec<String>,
}

/// Returns the 1-based line number of the first active `#error` directive.
pub(crate) fn find_error(source: &str) -> Option<usize> {
    let mut found = None;
    scan(source, |line_no, line| {
        if found.is_none() && line.starts_with("#error") {
            found = Some(line_no);
        }
    });
    found
}

/// Collects active declarations of a stage.
pub(crate) fn declarations(source: &str, is_vertex: bool) -> Declarations {
    let mut out = Declarations::default();
    scan(source, |_, line| {
        let line = strip_layout(line);
        let mut tokens = line.split_whitespace().peekable();
        let qualifier = match tokens.next() {
            Some(q) => q,
            None => return,
        };
        let is_uniform = qualifier == "uniform";
        let is_attribute = is_vertex && (qualifier == "in" || qualifier == "attribute");
        if !is_uniform && !is_attribute {
            return;
        }
        while matches!(tokens.peek(), Some(&("lowp" | "mediump" | "highp"))) {
            tokens.next();
        }
        let _ty = tokens.next();
        let Some(name) = tokens.next() else { return };
        if name.contains('{') {
            return;
        }
        let name = name
            .trim_end_matches(';')
            .split('[')
            .next()
            .unwrap_or_default()
            .to_string();
        if name.is_empty() {
            return;
        }
        if is_uniform {
            out.uniforms.push(name);
        } else {
            out.attributes.push(name);
        }
    });
    out
}

fn strip_layout(line: &str) -> &str {
    if line.starts_with("layout") {
        if let Some(end) = line.find(')') {
            return line[end + 1..].trim_start();
        }
    }
    line
}

/// Walks the source, calling `visit` for every active non-directive line and
/// every active `#error`.
fn scan(source: &str, mut visit: impl FnMut(usize, &str)) {
    let mut defines: HashSet<String> = HashSet::new();
    // One entry per open conditional: (this branch active, any branch taken).
    let mut stack: Vec<(bool, bool)> = Vec::new();
    let active = |stack: &Vec<(bool, bool)>| stack.iter().all(|(on, _)| *on);

    for (i, raw) in source.lines().enumerate() {
        let line = raw.trim();
        if let Some(directive) = line.strip_prefix('#') {
            let mut parts = directive.split_whitespace();
            let keyword = parts.next().unwrap_or_default();
            let arg = parts.next().unwrap_or_default();
            match keyword {
                "define" if active(&stack) => {
                    defines.insert(arg.to_string());
                }
                "undef" if active(&stack) => {
                    defines.remove(arg);
                }
                "ifdef" => {
                    let on = defines.contains(arg);
                    stack.push((on, on));
                }
                "ifndef" => {
                    let on = !defines.contains(arg);
                    stack.push((on, on));
                }
                "if" => {
                    let on = eval_if(directive[2..].trim(), &defines);
                    stack.push((on, on));
                }
                "elif" => {
                    if let Some((on, taken)) = stack.last_mut() {
                        let cond = !*taken && eval_if(directive[4..].trim(), &defines);
                        *on = cond;
                        *taken |= cond;
                    }
                }
                "else" => {
                    if let Some((on, taken)) = stack.last_mut() {
                        *on = !*taken;
                        *taken = true;
                    }
                }
                "endif" => {
                    stack.pop();
                }
                "error" if active(&stack) => visit(i + 1, line),
                _ => {}
            }
            continue;
        }
        if active(&stack) {
            visit(i + 1, line);
        }
    }
}

/// Evaluates `defined(X)`, `!defined(X)`, `||` and `&&` chains, and integer
/// literals. Anything else is treated as true.
fn eval_if(expr: &str, defines: &HashSet<String>) -> bool {
    if expr.contains("||") {
        return expr.split("||").any(|e| eval_if(e.trim(), defines));
    }
    if expr.contains("&&") {
        return expr.split("&&").all(|e| eval_if(e.trim(), defines));
    }
    if let Some(rest) = expr.strip_prefix('!') {
        return !eval_if(rest.trim(), defines);
    }
    if let Some(inner) = expr
        .strip_prefix("defined")
        .map(|s| s.trim().trim_start_matches('(').trim_end_matches(')').trim())
    {
        return defines.contains(inner);
    }
    expr.parse::<i64>().map(|v| v != 0).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "#define USE_MAP\n\
        uniform mat4 modelMatrix;\n\
        uniform highp vec3 lights[4];\n\
        #ifdef USE_MAP\n\
        uniform sampler2D map;\n\
        #else\n\
        uniform vec3 fallback;\n\
        #endif\n\
        #if defined(USE_FOG) || defined(USE_MAP)\n\
        uniform float fogNear;\n\
        #endif\n\
        layout(location = 0) in vec3 position;\n\
        in vec2 uv;\n";

    #[test]
    fn test_declarations_follow_preprocessor() {
        let d = declarations(SOURCE, true);
        assert_eq!(d.uniforms, vec!["modelMatrix", "lights", "map", "fogNear"]);
        assert_eq!(d.attributes, vec!["position", "uv"]);
    }

    #[test]
    fn test_fragment_inputs_are_not_attributes() {
        let d = declarations("in vec2 vUv;\nuniform float opacity;\n", false);
        assert!(d.attributes.is_empty());
        assert_eq!(d.uniforms, vec!["opacity"]);
    }

    #[test]
    fn test_error_directive_respects_conditionals() {
        assert_eq!(find_error("void main(){}\n#error broken\n"), Some(2));
        assert_eq!(find_error("#ifdef NOPE\n#error broken\n#endif\n"), None);
    }
}

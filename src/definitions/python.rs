//! Python definition extraction using tree-sitter.

use smallvec::SmallVec;
use tree_sitter::Node;

use super::{DefinitionSummary, ParseError, node_text, with_python_parser};

/// Parse Python source and collect public top-level definitions.
pub fn extract(content: &str) -> Result<DefinitionSummary, ParseError> {
    with_python_parser(|parser| {
        let tree = parser.parse(content, None).ok_or(ParseError::NoTree)?;
        let root = tree.root_node();

        if root.has_error() {
            if let Some(err) = first_error(root) {
                return Err(err);
            }
        }
        if let Some(err) = first_rejected(root, false) {
            return Err(err);
        }

        let mut summary = DefinitionSummary::default();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            collect_statement(child, content, &mut summary);
        }
        Ok(summary)
    })?
}

/// Locate the first ERROR or MISSING node in document order.
fn first_error(node: Node) -> Option<ParseError> {
    if node.is_error() || node.is_missing() {
        let message = if node.is_missing() {
            format!("expected '{}'", node.kind())
        } else {
            "invalid syntax".to_string()
        };
        return Some(syntax_error(node, &message));
    }

    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .filter(|child| child.has_error())
        .find_map(first_error);
    found
}

/// Find constructs the grammar accepts but Python 3 rejects.
fn first_rejected(node: Node, in_function: bool) -> Option<ParseError> {
    let message = match node.kind() {
        "print_statement" => Some("missing parentheses in call to 'print'"),
        "exec_statement" => Some("missing parentheses in call to 'exec'"),
        "return_statement" if !in_function => Some("'return' outside function"),
        "parameters" => follows_var_keyword(node),
        _ => None,
    };
    if let Some(message) = message {
        return Some(syntax_error(node, message));
    }

    let in_function = match node.kind() {
        "function_definition" => true,
        "class_definition" => false,
        _ => in_function,
    };

    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find_map(|child| first_rejected(child, in_function));
    found
}

/// `def f(**kw, a)`: nothing may follow `**kw`.
fn follows_var_keyword(parameters: Node) -> Option<&'static str> {
    let mut cursor = parameters.walk();
    let mut seen = false;
    for param in parameters.named_children(&mut cursor) {
        if param.kind() == "comment" {
            continue;
        }
        if seen {
            return Some("arguments cannot follow var-keyword argument");
        }
        seen = param.kind() == "dictionary_splat_pattern"
            || (param.kind() == "typed_parameter"
                && param
                    .named_child(0)
                    .is_some_and(|inner| inner.kind() == "dictionary_splat_pattern"));
    }
    None
}

fn syntax_error(node: Node, message: &str) -> ParseError {
    let start = node.start_position();
    ParseError::Syntax {
        message: message.to_string(),
        line: start.row + 1,
        column: start.column + 1,
    }
}

fn collect_statement(node: Node, content: &str, summary: &mut DefinitionSummary) {
    match node.kind() {
        "function_definition" => {
            let Some(name) = definition_name(node, content) else {
                return;
            };
            if is_private(&name) {
                return;
            }
            let params = positional_parameters(node, content);
            summary
                .functions
                .push(format!("{}({})", name, params.join(", ")));
        }
        "class_definition" => {
            let Some(name) = definition_name(node, content) else {
                return;
            };
            if is_private(&name) {
                return;
            }
            let params = constructor_parameters(node, content);
            if params.is_empty() {
                summary.classes.push(name);
            } else {
                summary
                    .classes
                    .push(format!("{}({})", name, params.join(", ")));
            }
        }
        "decorated_definition" => {
            if let Some(definition) = node.child_by_field_name("definition") {
                collect_statement(definition, content, summary);
            }
        }
        "expression_statement" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() == "assignment" {
                    collect_assignment(child, content, &mut summary.variables);
                }
            }
        }
        _ => {}
    }
}

fn definition_name(node: Node, content: &str) -> Option<String> {
    node.child_by_field_name("name")
        .map(|n| node_text(n, content))
}

fn is_private(name: &str) -> bool {
    name.starts_with('_')
}

/// Positional parameter names up to the first `*` or `*args`.
fn positional_parameters(function: Node, content: &str) -> Vec<String> {
    let Some(parameters) = function.child_by_field_name("parameters") else {
        return Vec::new();
    };

    let mut names = Vec::new();
    let mut cursor = parameters.walk();
    for param in parameters.named_children(&mut cursor) {
        let name = match param.kind() {
            "identifier" => Some(param),
            "default_parameter" | "typed_default_parameter" => param.child_by_field_name("name"),
            // `x: int` keeps the name as its first child; `*args: int` does not.
            "typed_parameter" => param
                .named_child(0)
                .filter(|inner| inner.kind() == "identifier"),
            "positional_separator" | "comment" => continue,
            _ => None,
        };

        match name {
            Some(name) => names.push(node_text(name, content)),
            None => break,
        }
    }
    names
}

/// Parameters of the last `__init__` in the class body, minus the receiver.
fn constructor_parameters(class: Node, content: &str) -> Vec<String> {
    let Some(body) = class.child_by_field_name("body") else {
        return Vec::new();
    };

    let mut init = None;
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        let function = match member.kind() {
            "function_definition" => Some(member),
            "decorated_definition" => member
                .child_by_field_name("definition")
                .filter(|d| d.kind() == "function_definition"),
            _ => None,
        };
        if let Some(function) = function {
            if definition_name(function, content).as_deref() == Some("__init__") {
                init = Some(function);
            }
        }
    }

    init.map(|function| {
        positional_parameters(function, content)
            .into_iter()
            .skip(1)
            .collect()
    })
    .unwrap_or_default()
}

fn collect_assignment(node: Node, content: &str, variables: &mut SmallVec<[String; 16]>) {
    // Annotated assignments (`x: int = 1`) carry a type field.
    if node.child_by_field_name("type").is_some() {
        return;
    }

    if let Some(left) = node.child_by_field_name("left") {
        collect_targets(left, content, variables);
    }

    // `a = b = 1` nests the second assignment on the right.
    if let Some(right) = node.child_by_field_name("right") {
        if right.kind() == "assignment" {
            collect_assignment(right, content, variables);
        }
    }
}

fn collect_targets(node: Node, content: &str, variables: &mut SmallVec<[String; 16]>) {
    match node.kind() {
        "identifier" => {
            let name = node_text(node, content);
            if !is_private(&name) {
                variables.push(name);
            }
        }
        "pattern_list" | "tuple_pattern" | "list_pattern" | "list_splat_pattern" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_targets(child, content, variables);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(content: &str) -> String {
        extract(content).unwrap().to_string()
    }

    #[test]
    fn test_function_with_positional_parameters() {
        assert_eq!(render("def foo(a, b): pass\n"), "Functions:\n  foo(a, b)");
    }

    #[test]
    fn test_class_constructor_drops_receiver() {
        let code = "class Point:\n    def __init__(self, x, y): pass\n";
        assert_eq!(render(code), "Classes:\n  Point(x, y)");
    }

    #[test]
    fn test_private_variables_excluded() {
        assert_eq!(render("_private = 1\npublic = 2\n"), "Variables:\n  public");
    }

    #[test]
    fn test_empty_module() {
        assert_eq!(render(""), "");
    }

    #[test]
    fn test_invalid_source_is_error() {
        let err = extract("def broken(:\n    pass\n").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }

    #[test]
    fn test_python2_print_is_error() {
        let err = extract("print \"hello\"\nX = 1\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::Syntax {
                message: "missing parentheses in call to 'print'".into(),
                line: 1,
                column: 1,
            }
        );
    }

    #[test]
    fn test_return_outside_function_is_error() {
        let err = extract("return 5\nZ = 1\n").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Syntax { ref message, line: 1, .. } if message == "'return' outside function"
        ));

        let err = extract("class C:\n    return 1\n").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 2, .. }));
    }

    #[test]
    fn test_return_inside_function_is_fine() {
        let code = "def f():\n    if True:\n        return 1\n\nclass K:\n    def m(self):\n        return 2\n";
        assert_eq!(render(code), "Classes:\n  K\nFunctions:\n  f()");
    }

    #[test]
    fn test_parameter_after_var_keyword_is_error() {
        let err = extract("def f(**k, a): pass\n").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
        assert_eq!(render("def g(a, **k): pass\n"), "Functions:\n  g(a)");
    }

    #[test]
    fn test_error_position_is_one_based() {
        let err = extract("x = 1\ny = (\n").unwrap_err();
        match err {
            ParseError::Syntax { line, column, .. } => {
                assert!(line >= 1);
                assert!(column >= 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parameters_drop_annotations_and_defaults() {
        let code = "def f(a: int, b=2, c: str = 'x'): pass\n";
        assert_eq!(render(code), "Functions:\n  f(a, b, c)");
    }

    #[test]
    fn test_parameters_stop_at_star() {
        assert_eq!(
            render("def f(a, *args, b, **kw): pass\n"),
            "Functions:\n  f(a)"
        );
        assert_eq!(render("def g(a, *, b): pass\n"), "Functions:\n  g(a)");
        assert_eq!(render("def h(*args): pass\n"), "Functions:\n  h()");
    }

    #[test]
    fn test_positional_only_parameters_included() {
        assert_eq!(render("def f(a, /, b): pass\n"), "Functions:\n  f(a, b)");
    }

    #[test]
    fn test_async_and_decorated_functions() {
        let code = "async def fetch(url): pass\n\n@cache\ndef load(path): pass\n";
        assert_eq!(render(code), "Functions:\n  fetch(url)\n  load(path)");
    }

    #[test]
    fn test_private_functions_and_classes_excluded() {
        let code = "def _hidden(): pass\nclass _Impl: pass\ndef shown(): pass\n";
        assert_eq!(render(code), "Functions:\n  shown()");
    }

    #[test]
    fn test_class_without_constructor() {
        assert_eq!(render("class Empty:\n    pass\n"), "Classes:\n  Empty");
        assert_eq!(
            render("class Bare:\n    def __init__(self): pass\n"),
            "Classes:\n  Bare"
        );
    }

    #[test]
    fn test_last_constructor_wins() {
        let code = "\
class Config:
    def __init__(self, a): pass

    @overload
    def __init__(self, path, strict=False): pass
";
        assert_eq!(render(code), "Classes:\n  Config(path, strict)");
    }

    #[test]
    fn test_decorated_class() {
        let code = "@dataclass\nclass Item:\n    def __init__(self, name): pass\n";
        assert_eq!(render(code), "Classes:\n  Item(name)");
    }

    #[test]
    fn test_nested_definitions_ignored() {
        let code = "\
def outer():
    def inner(): pass
    local = 1

class Box:
    size = 3
    def method(self): pass
";
        assert_eq!(render(code), "Classes:\n  Box\nFunctions:\n  outer()");
    }

    #[test]
    fn test_chained_and_unpacked_assignments() {
        let code = "a = b = 1\nc, (d, *e) = f()\n[g, _h] = 1, 2\n";
        assert_eq!(
            render(code),
            "Variables:\n  a\n  b\n  c\n  d\n  e\n  g"
        );
    }

    #[test]
    fn test_non_plain_assignments_ignored() {
        let code = "x: int = 1\ny += 2\nobj.attr = 3\nitems[0] = 4\nz = 5\n";
        assert_eq!(render(code), "Variables:\n  z");
    }

    #[test]
    fn test_groups_render_in_fixed_order() {
        let code = "LIMIT = 10\ndef run(job): pass\nclass Worker:\n    def __init__(self, id): pass\n";
        assert_eq!(
            render(code),
            "Classes:\n  Worker(id)\nFunctions:\n  run(job)\nVariables:\n  LIMIT"
        );
    }
}

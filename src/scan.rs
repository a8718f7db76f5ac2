//! Extraction of test cases embedded as comment blocks in a source file.
//!
//! A block looks like
//!
//! ```text
//! //TESTCASE: 5 7
//! //12
//! ```
//!
//! The marker line carries the arguments, the comment lines directly below it
//! carry the expected standard output.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// 1-based line of the marker.
    pub line: usize,
    pub arguments: Vec<String>,
    pub expected_output: Vec<String>,
}

/// Line prefixes recognised by the scanner.
#[derive(Debug, Clone, Copy)]
pub struct Syntax<'a> {
    pub marker: &'a str,
    pub comment_prefix: &'a str,
}

pub fn scan(source: &str, syntax: Syntax<'_>) -> Vec<TestCase> {
    let lines: Vec<&str> = source.lines().collect();
    let mut cases = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let Some(rest) = lines[i].strip_prefix(syntax.marker) else {
            i += 1;
            continue;
        };
        let line = i + 1;
        let arguments = rest
            .split(' ')
            .filter(|arg| !arg.is_empty())
            .map(str::to_string)
            .collect();

        let mut expected_output = Vec::new();
        i += 1;
        while i < lines.len() {
            let current = lines[i];
            if current.starts_with(syntax.marker) {
                break;
            }
            match current.strip_prefix(syntax.comment_prefix) {
                Some(text) => expected_output.push(text.to_string()),
                None => break,
            }
            i += 1;
        }

        cases.push(TestCase {
            line,
            arguments,
            expected_output,
        });
    }

    cases
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_default(source: &str) -> Vec<TestCase> {
        let syntax = Syntax {
            marker: "//TESTCASE:",
            comment_prefix: "//",
        };
        scan(source, syntax)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_markers_yields_no_cases() {
        let source = "func main()\nbegin\n  // just a comment\n  print 1\nend\n";
        assert!(scan_default(source).is_empty());
    }

    #[test]
    fn marker_with_expected_block() {
        let cases = scan_default("//TESTCASE: a b\n//x\n//y\nfunc main() begin end\n");
        assert_eq!(
            cases,
            vec![TestCase {
                line: 1,
                arguments: strings(&["a", "b"]),
                expected_output: strings(&["x", "y"]),
            }]
        );
    }

    #[test]
    fn repeated_spaces_collapse() {
        let cases = scan_default("//TESTCASE: a   b \n");
        assert_eq!(cases[0].arguments, strings(&["a", "b"]));
    }

    #[test]
    fn marker_without_arguments() {
        let cases = scan_default("//TESTCASE:\n//hello\n");
        assert!(cases[0].arguments.is_empty());
        assert_eq!(cases[0].expected_output, strings(&["hello"]));
    }

    #[test]
    fn adjacent_markers_produce_empty_expectations() {
        let cases = scan_default("//TESTCASE: 1\n//TESTCASE: 2\n");
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].arguments, strings(&["1"]));
        assert!(cases[0].expected_output.is_empty());
        assert_eq!(cases[1].line, 2);
        assert_eq!(cases[1].arguments, strings(&["2"]));
        assert!(cases[1].expected_output.is_empty());
    }

    #[test]
    fn block_stops_at_non_comment_line() {
        let source = "//TESTCASE: 3\n//9\nfunc main() begin end\n//not expected\n";
        let cases = scan_default(source);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].expected_output, strings(&["9"]));
    }

    #[test]
    fn only_prefix_is_stripped() {
        let cases = scan_default("//TESTCASE:\n//  indented\n//\n// x\n");
        assert_eq!(cases[0].expected_output, strings(&["  indented", "", " x"]));
    }

    #[test]
    fn indented_marker_is_ignored() {
        assert!(scan_default("  //TESTCASE: 1\n//1\n").is_empty());
    }

    #[test]
    fn crlf_line_endings() {
        let cases = scan_default("//TESTCASE: 4\r\n//16\r\n//done\r\n");
        assert_eq!(cases[0].arguments, strings(&["4"]));
        assert_eq!(cases[0].expected_output, strings(&["16", "done"]));
    }

    #[test]
    fn cases_keep_file_order_and_lines() {
        let source = "x\n//TESTCASE: 1\n//1\n\n//TESTCASE: 2\n//4\n";
        let lines: Vec<usize> = scan_default(source).iter().map(|c| c.line).collect();
        assert_eq!(lines, vec![2, 5]);
    }

    #[test]
    fn custom_syntax() {
        let syntax = Syntax {
            marker: "#CASE:",
            comment_prefix: "#",
        };
        let cases = scan("#CASE: -v\n# ok\n//ignored\n", syntax);
        assert_eq!(cases[0].arguments, strings(&["-v"]));
        assert_eq!(cases[0].expected_output, strings(&[" ok"]));
    }
}

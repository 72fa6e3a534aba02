mod cases;

use cases::TEST_CASES;
use moocode::{CompilationOptions, FormatVersion, Program, VectorId, compile, decompile_program};
use pretty_assertions::assert_eq;

#[test]
fn test_programs_survive_persistence() {
    for case in TEST_CASES.iter() {
        let program = compile(&case.verb, &CompilationOptions::default());
        let bytes = program.to_bytes().unwrap();
        let restored = Program::from_bytes(&bytes).unwrap();

        assert_eq!(restored.to_string(), program.to_string(), "case {}", case.name);
        assert_eq!(
            decompile_program(&restored, None).body,
            case.verb.body,
            "case {}",
            case.name
        );
    }
}

#[test]
fn test_line_memo_is_not_persisted() {
    let case = &TEST_CASES[0];
    let program = compile(&case.verb, &CompilationOptions::default());
    assert_eq!(program.line_for(VectorId::Main, 0), 1);
    let restored = Program::from_bytes(&program.to_bytes().unwrap()).unwrap();
    assert_eq!(restored.line_for(VectorId::Main, 0), 1);
}

#[test]
fn test_older_format_version_is_kept() {
    let case = TEST_CASES
        .iter()
        .find(|case| case.name == "named_while_continue")
        .unwrap();
    let options = CompilationOptions {
        version: FormatVersion::BreakCont,
        ..CompilationOptions::default()
    };
    let program = compile(&case.verb, &options);
    let restored = Program::from_bytes(&program.to_bytes().unwrap()).unwrap();
    assert_eq!(restored.version(), FormatVersion::BreakCont);
    assert_eq!(decompile_program(&restored, None).body, case.verb.body);
}

#[test]
fn test_unknown_format_version_is_rejected() {
    let case = &TEST_CASES[0];
    let mut bytes = compile(&case.verb, &CompilationOptions::default())
        .to_bytes()
        .unwrap();
    // the version tag leads the encoding
    bytes[0] = 42;
    assert!(Program::from_bytes(&bytes).is_err());
}

#[test]
fn test_truncated_program_is_rejected() {
    let case = &TEST_CASES[0];
    let bytes = compile(&case.verb, &CompilationOptions::default())
        .to_bytes()
        .unwrap();
    assert!(Program::from_bytes(&bytes[..bytes.len() / 2]).is_err());
}

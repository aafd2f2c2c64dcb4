// Line input, tokenisation and a small command loop
mod common;

use common::{dictionary_entry, Story, PARSE_BUFFER, TEXT_BUFFER};
use zvm::host::RecordingHost;
use zvm::StepStatus;

const SREAD: [u8; 6] = [0xE4, 0x0F, 0x06, 0x00, 0x06, 0x60];

#[test]
fn test_sread_fills_text_and_parse_buffers() {
    let host = RecordingHost::new();
    let mut code = SREAD.to_vec();
    code.push(0xBA);
    let mut interp = Story::new(3)
        .words(&["look", "take", "lamp"])
        .code(&code)
        .machine("input.z", &host);

    assert_eq!(interp.run(10), StepStatus::WaitingForLine);
    interp.provide_line("Take LAMP\n", false).unwrap();

    let mem = &interp.vm.memory;
    let typed = mem.read_bytes(TEXT_BUFFER + 1, 10).unwrap();
    assert_eq!(typed, b"take lamp\0");

    assert_eq!(mem.get_byte(PARSE_BUFFER + 1).unwrap(), 2);
    // dictionary order: lamp, look, take
    assert_eq!(mem.get_word(PARSE_BUFFER + 2).unwrap(), dictionary_entry(3, 2));
    assert_eq!(mem.get_byte(PARSE_BUFFER + 4).unwrap(), 4);
    assert_eq!(mem.get_byte(PARSE_BUFFER + 5).unwrap(), 1);
    assert_eq!(mem.get_word(PARSE_BUFFER + 6).unwrap(), dictionary_entry(3, 0));
    assert_eq!(mem.get_byte(PARSE_BUFFER + 8).unwrap(), 4);
    assert_eq!(mem.get_byte(PARSE_BUFFER + 9).unwrap(), 6);

    assert_eq!(interp.run(10), StepStatus::Halted);
}

#[test]
fn test_unknown_words_and_separators() {
    let host = RecordingHost::new();
    let mut code = SREAD.to_vec();
    code.push(0xBA);
    let mut interp = Story::new(3)
        .words(&["look"])
        .code(&code)
        .machine("input.z", &host);

    assert_eq!(interp.run(10), StepStatus::WaitingForLine);
    interp.provide_line("xyzzy,look", false).unwrap();

    let mem = &interp.vm.memory;
    assert_eq!(mem.get_byte(PARSE_BUFFER + 1).unwrap(), 3);
    assert_eq!(mem.get_word(PARSE_BUFFER + 2).unwrap(), 0);
    // the comma is a word of its own, not in the dictionary
    assert_eq!(mem.get_byte(PARSE_BUFFER + 8).unwrap(), 1);
    assert_eq!(mem.get_byte(PARSE_BUFFER + 9).unwrap(), 6);
    assert_eq!(mem.get_word(PARSE_BUFFER + 10).unwrap(), dictionary_entry(3, 0));
    assert_eq!(mem.get_byte(PARSE_BUFFER + 13).unwrap(), 7);
}

#[test]
fn test_dictionary_search_matches_linear_lookup() {
    let host = RecordingHost::new();
    let words = ["apple", "banana", "cherry", "grape", "lemon", "mango", "zebra"];
    let interp = Story::new(5)
        .words(&words)
        .code(&[0xBA])
        .machine("dict.z", &host);

    let vm = &interp.vm;
    for (i, word) in words.iter().enumerate() {
        let linear = vm.dictionary.lookup(&vm.memory, &vm.codec, word).unwrap();
        let binary = vm.dictionary.binary_search(&vm.codec, word).unwrap();
        assert_eq!(linear, dictionary_entry(5, i), "{word}");
        assert_eq!(binary, linear, "{word}");
    }
    for missing in ["aardvark", "kiwi", "zzz"] {
        assert_eq!(vm.dictionary.lookup(&vm.memory, &vm.codec, missing).unwrap(), 0);
        assert_eq!(vm.dictionary.binary_search(&vm.codec, missing).unwrap(), 0);
    }
}

#[test]
fn test_command_loop() {
    let host = RecordingHost::new();
    // 800 sread ; 806 loadw parse #1 -> g11
    // 80c je g11 quit ?82a ; 812 je g11 look ?821
    // 818 print "what" ; new_line ; jump 800
    // 821 print "dark" ; new_line ; jump 800
    // 82a quit
    let mut code = SREAD.to_vec();
    code.extend_from_slice(&[0xCF, 0x1F, 0x06, 0x60, 0x01, 0x11]);
    code.extend_from_slice(&[0xC1, 0x8F, 0x11, 0x03, 0x0D, 0xDA]);
    code.extend_from_slice(&[0xC1, 0x8F, 0x11, 0x03, 0x06, 0xCB]);
    code.push(0xB2);
    code.extend_from_slice(&common::text("what"));
    code.extend_from_slice(&[0xBB, 0x8C, 0xFF, 0xE1]);
    code.push(0xB2);
    code.extend_from_slice(&common::text("dark"));
    code.extend_from_slice(&[0xBB, 0x8C, 0xFF, 0xD8]);
    code.push(0xBA);
    assert_eq!(code.len(), 0x2B);

    let mut interp = Story::new(3)
        .words(&["look", "quit"])
        .code(&code)
        .machine("loop.z", &host);

    for line in ["xyzzy", "look"] {
        assert_eq!(interp.run(100), StepStatus::WaitingForLine);
        interp.provide_line(line, false).unwrap();
    }
    assert_eq!(interp.run(100), StepStatus::WaitingForLine);
    interp.provide_line("quit", false).unwrap();
    assert_eq!(interp.run(100), StepStatus::Halted);
    assert_eq!(host.output(), "what\ndark\n");
    // one status line per read
    assert_eq!(host.statuses().len(), 3);
}

#[test]
fn test_echoed_input_reaches_screen() {
    let host = RecordingHost::new();
    let mut code = SREAD.to_vec();
    code.push(0xBA);
    let mut interp = Story::new(3).code(&code).machine("echo.z", &host);
    assert_eq!(interp.run(10), StepStatus::WaitingForLine);
    interp.provide_line("hello", true).unwrap();
    assert!(host.output().contains("hello"));
}

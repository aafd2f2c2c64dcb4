// Save and restore through a recording host
mod common;

use common::Story;
use zvm::host::{RecordingHost, SaveRestore};
use zvm::snapshot::Snapshot;
use zvm::StepStatus;

#[test]
fn test_v3_restore_resumes_after_save_branch() {
    let host = RecordingHost::new();
    // 800 store g10 #1 ; 803 save ?807 ; 805 quit ; 807 store g10 #2
    // 80a restore ?80e ; 80c quit
    let code = [
        0x0D, 0x10, 0x01,
        0xB5, 0xC4,
        0xBA, 0xBA,
        0x0D, 0x10, 0x02,
        0xB6, 0xC4,
        0xBA, 0xBA,
        0xBA,
    ];
    let mut interp = Story::new(3).code(&code).machine("game.z", &host);

    assert_eq!(interp.step(), StepStatus::Running);
    assert_eq!(interp.step(), StepStatus::Running);
    assert_eq!(interp.pc(), 0x807);
    let saved = host.saved("game.z").expect("snapshot stored");
    assert_eq!(saved.pc, 0x803);
    assert_eq!(saved.source_name, "game.z");

    assert_eq!(interp.step(), StepStatus::Running);
    assert_eq!(interp.vm.read_global(0x10).unwrap(), 2);
    assert_eq!(interp.step(), StepStatus::Running);

    // back at the save instruction's branch target with the old globals
    assert_eq!(interp.pc(), 0x807);
    assert_eq!(interp.vm.read_global(0x10).unwrap(), 1);
}

#[test]
fn test_v4_save_and_restore_store_results() {
    let host = RecordingHost::new();
    // 800 store g10 #1 ; 803 save -> g11 ; 805 store g10 #2 ; 808 restore -> g11
    let code = [
        0x0D, 0x10, 0x01,
        0xB5, 0x11,
        0x0D, 0x10, 0x02,
        0xB6, 0x11,
        0xBA,
    ];
    let mut interp = Story::new(4).code(&code).machine("game.z", &host);

    for _ in 0..2 {
        assert_eq!(interp.step(), StepStatus::Running);
    }
    assert_eq!(interp.vm.read_global(0x11).unwrap(), 1);
    for _ in 0..2 {
        assert_eq!(interp.step(), StepStatus::Running);
    }
    assert_eq!(interp.pc(), 0x805);
    assert_eq!(interp.vm.read_global(0x10).unwrap(), 1);
    assert_eq!(interp.vm.read_global(0x11).unwrap(), 1);
}

#[test]
fn test_restore_without_save_fails() {
    let host = RecordingHost::new();
    // restore ?+4 ; quit ; quit
    let mut interp = Story::new(3)
        .code(&[0xB6, 0xC4, 0xBA, 0xBA])
        .machine("fresh.z", &host);
    assert_eq!(interp.step(), StepStatus::Running);
    assert_eq!(interp.pc(), 0x802);
}

#[test]
fn test_restore_rejects_other_story() {
    let host = RecordingHost::new();
    // save ?+4 (taken) ; quit ; restore ?+4 ; quit ; quit
    let code = [0xB5, 0xC4, 0xBA, 0xBA, 0xB6, 0xC4, 0xBA, 0xBA];
    let mut first = Story::new(3).code(&code).machine("first.z", &host);
    assert_eq!(first.step(), StepStatus::Running);
    let snapshot = host.saved("first.z").expect("snapshot stored");

    let mut store = host.clone();
    store.save("second.z", &snapshot).unwrap();

    let mut second = Story::new(3).code(&code[4..]).machine("second.z", &host);
    assert_eq!(second.step(), StepStatus::Running);
    assert_eq!(second.pc(), 0x802);
    assert_eq!(second.run(5), StepStatus::Halted);
}

#[test]
fn test_restore_ignores_snapshot_that_does_not_decode() {
    let host = RecordingHost::new();
    // restore ?+4 ; quit ; quit
    let mut interp = Story::new(3)
        .code(&[0xB6, 0xC4, 0xBA, 0xBA])
        .machine("bad.z", &host);
    let snapshot = Snapshot::capture(&interp.vm, 0xFFFF, "bad.z");
    host.clone().save("bad.z", &snapshot).unwrap();

    assert_eq!(interp.step(), StepStatus::Running);
    assert_eq!(interp.pc(), 0x802);
    assert_eq!(interp.run(5), StepStatus::Halted);
}

#[test]
fn test_restore_into_fresh_machine_reproduces_state() {
    let host = RecordingHost::new();
    // 0x900 (a, b, c=0x33): storew #0480 #0 #1234 ; storeb #0490 #3 #99
    // store g20 #5 ; push #ab ; push b ; save ?+4 ; quit ; quit ; quit
    let routine = [
        0xE1, 0x13, 0x04, 0x80, 0x00, 0x12, 0x34,
        0xE2, 0x17, 0x04, 0x90, 0x03, 0x63,
        0x0D, 0x20, 0x05,
        0xE8, 0x7F, 0xAB,
        0xE8, 0xBF, 0x02,
        0xB5, 0xC4,
        0xBA, 0xBA, 0xBA,
    ];
    let story = || Story::new(3).routine(0x900, &[0, 0, 0x33], &routine);

    // call 0x900 #7 #8 -> g10 ; quit
    let mut first = story()
        .code(&[0xE0, 0x17, 0x04, 0x80, 0x07, 0x08, 0x10, 0xBA])
        .machine("game.z", &host);
    for _ in 0..7 {
        assert_eq!(first.step(), StepStatus::Running);
    }
    let saved = host.saved("game.z").expect("snapshot stored");
    assert_eq!(saved.pc, 0x91D);
    assert_eq!(first.locals(), vec![7, 8, 0x33]);

    // restore ?+4 ; quit ; quit
    let mut second = story()
        .code(&[0xB6, 0xC4, 0xBA, 0xBA])
        .machine("game.z", &host);
    assert_eq!(second.step(), StepStatus::Running);

    assert_eq!(second.vm.memory.dynamic(), first.vm.memory.dynamic());
    assert_eq!(second.vm.stack.cells(), first.vm.stack.cells());
    assert_eq!(second.frame_pointer(), first.frame_pointer());
    assert_eq!(second.locals(), vec![7, 8, 0x33]);
    assert_eq!(second.vm.read_global(0x20).unwrap(), 5);
    assert_eq!(second.vm.memory.get_word(0x480).unwrap(), 0x1234);
    // resumed at the save's branch target
    assert_eq!(second.pc(), 0x921);
}

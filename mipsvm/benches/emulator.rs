use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mipsvm::{parse_listing, MipsEmulator};

pub fn criterion_benchmark(c: &mut Criterion) {
    let program = parse_listing(
        "
.data
$Counter_vtable:
    .word Counter_incr
.text
main:
    li $a0, 8
    li $v0, 9
    syscall
    la $t0, $Counter_vtable
    sw $t0, 0($v0)
    move $s0, $v0
    li $s1, 0
loop:
    lw $t0, 0($s0)
    lw $t0, 0($t0)
    jalr $t0
    addi $s1, $s1, 1
    j loop
Counter_incr:
    addi $sp, $sp, -4
    sw $ra, 0($sp)
    lw $t1, 4($s0)
    addi $t1, $t1, 1
    sw $t1, 4($s0)
    lw $ra, 0($sp)
    addi $sp, $sp, 4
    jr $ra
",
    )
    .unwrap();

    c.bench_function("virtual call loop", |b| {
        b.iter(|| {
            let mut vm = MipsEmulator::new(program.clone()).unwrap();
            vm.run(black_box(2000))
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

//! Ready-made programs, built directly as syntax trees.

use crate::ast::{
    ClassDefinition, Constructor, Exp, Extends, Lhs, MethodDefinition, Program, Stmt, Type,
    VarDec,
};

pub struct Sample {
    pub name: &'static str,
    pub description: &'static str,
    /// What the compiled program prints when run.
    pub expected_output: &'static str,
    build: fn() -> Program,
}

impl Sample {
    pub fn program(&self) -> Program {
        (self.build)()
    }
}

pub fn all() -> Vec<Sample> {
    vec![
        Sample {
            name: "trivial",
            description: "construct an empty class and print what a method returns",
            expected_output: "1\n",
            build: trivial,
        },
        Sample {
            name: "override",
            description: "a subclass override reached through a base-typed variable",
            expected_output: "2\n",
            build: override_field,
        },
        Sample {
            name: "inherited",
            description: "calling both an overridden and an inherited virtual method",
            expected_output: "10\n2\n",
            build: inherited,
        },
        Sample {
            name: "super",
            description: "a subclass constructor passing arguments to super",
            expected_output: "5\n7\n",
            build: super_init,
        },
        Sample {
            name: "siblings",
            description: "two subclasses overriding the same virtual method",
            expected_output: "0\n3\n4\n",
            build: siblings,
        },
        Sample {
            name: "generics",
            description: "generic classes, a specialised superclass and a generic method",
            expected_output: "42\n7\n9\n5\n",
            build: generics,
        },
        Sample {
            name: "fields",
            description: "nested field assignment and a vtable introduced below a field",
            expected_output: "8\n6\n6\n11\n",
            build: fields,
        },
    ]
}

pub fn find(name: &str) -> Option<Sample> {
    all().into_iter().find(|sample| sample.name == name)
}

fn int(name: &str) -> VarDec {
    VarDec::new(Type::Int, name)
}

fn object(class: &str, name: &str) -> VarDec {
    VarDec::new(Type::class(class), name)
}

fn empty_constructor() -> Constructor {
    Constructor::new(vec![], Stmt::Empty)
}

fn returns_int(is_virtual: bool, name: &str, value: i32) -> MethodDefinition {
    MethodDefinition::new(is_virtual, Type::Int, name, vec![], Stmt::ret(Some(Exp::int(value))))
}

/// `<vardec> = <receiver>.<method>(); print(<vardec>);` for int results.
fn call_and_print(result: &str, receiver: &str, method: &str) -> Stmt {
    Stmt::seq(vec![
        Stmt::call(int(result), Exp::var(receiver), method, vec![], vec![]),
        Stmt::print(Exp::var(result)),
    ])
}

fn trivial() -> Program {
    Program::new(
        vec![ClassDefinition::new(
            "Foo",
            None,
            vec![],
            empty_constructor(),
            vec![returns_int(false, "one", 1)],
        )],
        Stmt::seq(vec![
            Stmt::construct(object("Foo", "foo"), "Foo", vec![], vec![]),
            call_and_print("x", "foo", "one"),
        ]),
    )
}

fn override_field() -> Program {
    Program::new(
        vec![
            ClassDefinition::new(
                "Base",
                None,
                vec![],
                empty_constructor(),
                vec![MethodDefinition::new(
                    true,
                    Type::Void,
                    "doPrint",
                    vec![],
                    Stmt::seq(vec![Stmt::print(Exp::int(1)), Stmt::ret(None)]),
                )],
            ),
            ClassDefinition::new(
                "Sub",
                Some(Extends::new("Base", vec![])),
                vec![int("x")],
                Constructor::new(
                    vec![int("x")],
                    Stmt::seq(vec![
                        Stmt::super_call(vec![]),
                        Stmt::assign(Lhs::this_field("x"), Exp::var("x")),
                    ]),
                ),
                vec![MethodDefinition::new(
                    true,
                    Type::Void,
                    "doPrint",
                    vec![],
                    Stmt::seq(vec![
                        Stmt::print(Exp::field(Lhs::This, "x")),
                        Stmt::ret(None),
                    ]),
                )],
            ),
        ],
        Stmt::seq(vec![
            Stmt::construct(object("Base", "b"), "Sub", vec![], vec![Exp::int(2)]),
            Stmt::call(
                VarDec::new(Type::Void, "unused"),
                Exp::var("b"),
                "doPrint",
                vec![],
                vec![],
            ),
        ]),
    )
}

fn inherited() -> Program {
    Program::new(
        vec![
            ClassDefinition::new(
                "Base",
                None,
                vec![],
                empty_constructor(),
                vec![returns_int(true, "first", 1), returns_int(true, "second", 2)],
            ),
            ClassDefinition::new(
                "Sub",
                Some(Extends::new("Base", vec![])),
                vec![],
                Constructor::new(vec![], Stmt::super_call(vec![])),
                vec![returns_int(true, "first", 10)],
            ),
        ],
        Stmt::seq(vec![
            Stmt::construct(object("Base", "s"), "Sub", vec![], vec![]),
            call_and_print("a", "s", "first"),
            call_and_print("b", "s", "second"),
        ]),
    )
}

fn super_init() -> Program {
    Program::new(
        vec![
            ClassDefinition::new(
                "Base",
                None,
                vec![int("x")],
                Constructor::new(
                    vec![int("x")],
                    Stmt::assign(Lhs::this_field("x"), Exp::var("x")),
                ),
                vec![],
            ),
            ClassDefinition::new(
                "Sub",
                Some(Extends::new("Base", vec![])),
                vec![int("y")],
                Constructor::new(
                    vec![int("x"), int("y")],
                    Stmt::seq(vec![
                        Stmt::super_call(vec![Exp::var("x")]),
                        Stmt::assign(Lhs::this_field("y"), Exp::var("y")),
                    ]),
                ),
                vec![],
            ),
        ],
        Stmt::seq(vec![
            Stmt::construct(
                object("Sub", "s"),
                "Sub",
                vec![],
                vec![Exp::int(5), Exp::int(7)],
            ),
            Stmt::print(Exp::field(Lhs::var("s"), "x")),
            Stmt::print(Exp::field(Lhs::var("s"), "y")),
        ]),
    )
}

fn siblings() -> Program {
    let shape = |name: &str, sides: i32| {
        ClassDefinition::new(
            name,
            Some(Extends::new("Shape", vec![])),
            vec![],
            Constructor::new(vec![], Stmt::super_call(vec![])),
            vec![returns_int(true, "sides", sides)],
        )
    };
    Program::new(
        vec![
            ClassDefinition::new(
                "Shape",
                None,
                vec![],
                empty_constructor(),
                vec![returns_int(true, "sides", 0)],
            ),
            shape("Triangle", 3),
            shape("Square", 4),
        ],
        Stmt::seq(vec![
            Stmt::construct(object("Shape", "s"), "Shape", vec![], vec![]),
            Stmt::construct(object("Shape", "t"), "Triangle", vec![], vec![]),
            Stmt::construct(object("Shape", "q"), "Square", vec![], vec![]),
            call_and_print("a", "s", "sides"),
            call_and_print("b", "t", "sides"),
            call_and_print("c", "q", "sides"),
        ]),
    )
}

fn generics() -> Program {
    let t = || Type::variable("T");
    let box_class = ClassDefinition::new(
        "Box",
        None,
        vec![VarDec::new(t(), "value")],
        Constructor::new(
            vec![VarDec::new(t(), "value")],
            Stmt::assign(Lhs::this_field("value"), Exp::var("value")),
        ),
        vec![MethodDefinition::new(
            false,
            t(),
            "get",
            vec![],
            Stmt::ret(Some(Exp::field(Lhs::This, "value"))),
        )],
    )
    .with_type_variables(&["T"]);
    let int_box = ClassDefinition::new(
        "IntBox",
        Some(Extends::new("Box", vec![Type::Int])),
        vec![],
        Constructor::new(vec![int("v")], Stmt::super_call(vec![Exp::var("v")])),
        vec![],
    );
    let counter = ClassDefinition::new(
        "Counter",
        None,
        vec![int("n")],
        Constructor::new(vec![int("n")], Stmt::assign(Lhs::this_field("n"), Exp::var("n"))),
        vec![MethodDefinition::new(
            true,
            Type::Int,
            "count",
            vec![],
            Stmt::ret(Some(Exp::field(Lhs::This, "n"))),
        )],
    );
    let util = ClassDefinition::new(
        "Util",
        None,
        vec![],
        empty_constructor(),
        vec![MethodDefinition::new(
            false,
            Type::variable("A"),
            "id",
            vec![VarDec::new(Type::variable("A"), "a")],
            Stmt::ret(Some(Exp::var("a"))),
        )
        .with_type_variables(&["A"])],
    );
    let box_of = |ty: Type| Type::generic("Box", vec![ty]);

    Program::new(
        vec![box_class, int_box, counter, util],
        Stmt::seq(vec![
            Stmt::construct(
                VarDec::new(box_of(Type::Int), "b"),
                "Box",
                vec![Type::Int],
                vec![Exp::int(42)],
            ),
            call_and_print("v", "b", "get"),
            Stmt::construct(object("Counter", "c"), "Counter", vec![], vec![Exp::int(7)]),
            Stmt::construct(
                VarDec::new(box_of(Type::class("Counter")), "bc"),
                "Box",
                vec![Type::class("Counter")],
                vec![Exp::var("c")],
            ),
            Stmt::call(object("Counter", "c2"), Exp::var("bc"), "get", vec![], vec![]),
            call_and_print("n", "c2", "count"),
            Stmt::construct(object("IntBox", "ib"), "IntBox", vec![], vec![Exp::int(9)]),
            call_and_print("w", "ib", "get"),
            Stmt::construct(object("Util", "u"), "Util", vec![], vec![]),
            Stmt::call(int("z"), Exp::var("u"), "id", vec![Type::Int], vec![Exp::int(5)]),
            Stmt::print(Exp::var("z")),
        ]),
    )
}

fn fields() -> Program {
    Program::new(
        vec![
            ClassDefinition::new(
                "Cell",
                None,
                vec![int("value")],
                Constructor::new(
                    vec![int("v")],
                    Stmt::assign(Lhs::this_field("value"), Exp::var("v")),
                ),
                vec![],
            ),
            ClassDefinition::new(
                "Holder",
                None,
                vec![object("Cell", "cell")],
                Constructor::new(
                    vec![object("Cell", "c")],
                    Stmt::assign(Lhs::this_field("cell"), Exp::var("c")),
                ),
                vec![],
            ),
            ClassDefinition::new(
                "Plain",
                None,
                vec![int("a")],
                Constructor::new(vec![int("a")], Stmt::assign(Lhs::this_field("a"), Exp::var("a"))),
                vec![],
            ),
            ClassDefinition::new(
                "Dispatching",
                Some(Extends::new("Plain", vec![])),
                vec![],
                Constructor::new(vec![int("a")], Stmt::super_call(vec![Exp::var("a")])),
                vec![MethodDefinition::new(
                    true,
                    Type::Int,
                    "get",
                    vec![],
                    Stmt::ret(Some(Exp::field(Lhs::This, "a"))),
                )],
            ),
        ],
        Stmt::seq(vec![
            Stmt::construct(object("Cell", "c"), "Cell", vec![], vec![Exp::int(3)]),
            Stmt::construct(object("Holder", "h"), "Holder", vec![], vec![Exp::var("c")]),
            Stmt::assign(
                Lhs::field(Lhs::field(Lhs::var("h"), "cell"), "value"),
                Exp::int(8),
            ),
            Stmt::print(Exp::field(Lhs::var("c"), "value")),
            Stmt::construct(
                object("Dispatching", "d"),
                "Dispatching",
                vec![],
                vec![Exp::int(6)],
            ),
            call_and_print("r", "d", "get"),
            Stmt::print(Exp::field(Lhs::var("d"), "a")),
            Stmt::assign(Lhs::field(Lhs::var("d"), "a"), Exp::int(11)),
            call_and_print("s", "d", "get"),
        ]),
    )
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use luaclass::{
        ClassDesc, Method, Previous, call_method, construct, defer_index, defer_newindex, get_class, inject_index,
        inject_method, inject_newindex, lua::object::{index, rawset_field, set_index}, new_class,
        register_class, register_native,
    };
    use mlua::prelude::*;

    fn key_is(key: &LuaValue, name: &str) -> bool {
        matches!(key, LuaValue::String(s) if s.to_string_lossy() == name)
    }

    fn w1(lua: &Lua, prev: &Previous, args: LuaMultiValue) -> LuaResult<LuaMultiValue> {
        let (object, key): (LuaValue, LuaValue) = lua.unpack_multi(args)?;
        if key_is(&key, "a") {
            return "W1".into_lua_multi(lua);
        }
        defer_index(prev, object, key)?.into_lua_multi(lua)
    }

    fn w2(lua: &Lua, prev: &Previous, args: LuaMultiValue) -> LuaResult<LuaMultiValue> {
        let (object, key): (LuaValue, LuaValue) = lua.unpack_multi(args)?;
        if key_is(&key, "b") {
            return "W2".into_lua_multi(lua);
        }
        defer_index(prev, object, key)?.into_lua_multi(lua)
    }

    fn text(lua: &Lua, object: &LuaValue, key: &str) -> luaclass::Result<Option<String>> {
        Ok(lua.unpack(index(object, key)?)?)
    }

    const CLASSES: &str = r#"
        local P = { __name = "P", inherited = "from parent" }
        local X = { __name = "X", __parent = P, c = "original" }
        function X:greet(who) return "hello " .. who end
        return X
    "#;

    #[test]
    fn test_index_injections_compose() -> luaclass::Result<()> {
        let lua = Lua::new();
        luaclass::open(&lua)?;
        let x: LuaTable = lua.load(CLASSES).eval()?;
        let class = register_class(&lua, &LuaValue::Table(x))?;

        inject_index(&lua, &class, w1)?;
        inject_index(&lua, &class, w2)?;

        let obj = construct(&lua, "X", LuaMultiValue::new())?;
        assert_eq!(text(&lua, &obj, "a")?.as_deref(), Some("W1"));
        assert_eq!(text(&lua, &obj, "b")?.as_deref(), Some("W2"));
        assert_eq!(text(&lua, &obj, "c")?.as_deref(), Some("original"));
        assert_eq!(text(&lua, &obj, "inherited")?.as_deref(), Some("from parent"));
        assert_eq!(text(&lua, &obj, "nothing")?, None);

        // Fields of the instance itself never reach __index.
        set_index(&obj, "a", "own")?;
        assert_eq!(text(&lua, &obj, "a")?.as_deref(), Some("own"));
        Ok(())
    }

    #[test]
    fn test_index_injection_on_native_instance() -> luaclass::Result<()> {
        fn alloc(_: &Lua) -> LuaResult<Box<dyn Any>> {
            Ok(Box::new(()))
        }

        let lua = Lua::new();
        luaclass::open(&lua)?;
        let class = register_native(&lua, ClassDesc::new("Gadget").with_alloc(alloc))?;
        class.raw_set("c", "original")?;
        inject_index(&lua, &class, w1)?;

        let obj = construct(&lua, "Gadget", LuaMultiValue::new())?;
        assert!(matches!(obj, LuaValue::UserData(_)));
        assert_eq!(text(&lua, &obj, "a")?.as_deref(), Some("W1"));
        assert_eq!(text(&lua, &obj, "c")?.as_deref(), Some("original"));
        Ok(())
    }

    fn guard(lua: &Lua, prev: &Previous, args: LuaMultiValue) -> LuaResult<LuaMultiValue> {
        let (object, key, value): (LuaValue, LuaValue, LuaValue) = lua.unpack_multi(args)?;
        if key_is(&key, "locked") {
            return Err(LuaError::RuntimeError("field 'locked' is read-only".to_string()));
        }
        if prev.is_nil() {
            rawset_field(&object, key, value)?;
        } else {
            defer_newindex(prev, object, key, value)?;
        }
        Ok(LuaMultiValue::new())
    }

    fn shout(lua: &Lua, prev: &Previous, args: LuaMultiValue) -> LuaResult<LuaMultiValue> {
        let (object, key, value): (LuaValue, LuaValue, LuaValue) = lua.unpack_multi(args)?;
        let value = match value {
            LuaValue::String(s) => LuaValue::String(lua.create_string(s.to_string_lossy().to_uppercase())?),
            other => other,
        };
        if prev.is_nil() {
            rawset_field(&object, key, value)?;
        } else {
            defer_newindex(prev, object, key, value)?;
        }
        Ok(LuaMultiValue::new())
    }

    #[test]
    fn test_newindex_injections_compose() -> luaclass::Result<()> {
        fn alloc(_: &Lua) -> LuaResult<Box<dyn Any>> {
            Ok(Box::new(()))
        }

        let lua = Lua::new();
        luaclass::open(&lua)?;
        let class = register_native(&lua, ClassDesc::new("Safe").with_alloc(alloc))?;
        inject_newindex(&lua, &class, guard)?;
        inject_newindex(&lua, &class, shout)?;

        let obj = construct(&lua, "Safe", LuaMultiValue::new())?;
        set_index(&obj, "name", "bob")?;
        assert_eq!(text(&lua, &obj, "name")?.as_deref(), Some("BOB"));

        let err = set_index(&obj, "locked", "x").expect_err("guard should refuse");
        assert!(err.to_string().contains("read-only"), "{err}");
        assert_eq!(text(&lua, &obj, "locked")?, None);

        // Present fields are assigned directly.
        rawset_field(&obj, "locked", "set by host")?;
        set_index(&obj, "locked", "changed")?;
        assert_eq!(text(&lua, &obj, "locked")?.as_deref(), Some("changed"));
        Ok(())
    }

    fn polite(lua: &Lua, prev: &Previous, args: LuaMultiValue) -> LuaResult<LuaMultiValue> {
        let greeting: String = lua.unpack_multi(prev.call(args)?)?;
        format!("{greeting}, please").into_lua_multi(lua)
    }

    fn fallback(lua: &Lua, prev: &Previous, _args: LuaMultiValue) -> LuaResult<LuaMultiValue> {
        assert!(prev.is_nil());
        "fallback".into_lua_multi(lua)
    }

    #[test]
    fn test_method_injection() -> luaclass::Result<()> {
        let lua = Lua::new();
        luaclass::open(&lua)?;
        let x: LuaTable = lua.load(CLASSES).eval()?;
        register_class(&lua, &LuaValue::Table(x))?;
        let class = get_class(&lua, "X")?.expect("X should be registered");

        inject_method(&lua, &class, "greet", polite)?;
        inject_method(&lua, &class, "missing", fallback)?;

        let obj = construct(&lua, "X", LuaMultiValue::new())?;
        let res: String = lua.unpack_multi(call_method(&obj, "greet", "world".into_lua_multi(&lua)?)?)?;
        assert_eq!(res, "hello world, please");
        let res: String = lua.unpack_multi(call_method(&obj, "missing", LuaMultiValue::new())?)?;
        assert_eq!(res, "fallback");

        lua.globals().set("obj", obj)?;
        let res: String = lua.load("return obj:greet('lua')").eval()?;
        assert_eq!(res, "hello lua, please");
        Ok(())
    }

    fn magic(lua: &Lua, prev: &Previous, args: LuaMultiValue) -> LuaResult<LuaMultiValue> {
        let (object, key): (LuaValue, LuaValue) = lua.unpack_multi(args)?;
        if key_is(&key, "magic") {
            return "W".into_lua_multi(lua);
        }
        defer_index(prev, object, key)?.into_lua_multi(lua)
    }

    fn hello(lua: &Lua, _: LuaMultiValue) -> LuaResult<LuaMultiValue> {
        "hello".into_lua_multi(lua)
    }

    fn own(lua: &Lua, _: LuaMultiValue) -> LuaResult<LuaMultiValue> {
        "own".into_lua_multi(lua)
    }

    fn say(lua: &Lua, object: &LuaValue, method: &str) -> luaclass::Result<String> {
        Ok(lua.unpack_multi(call_method(object, method, LuaMultiValue::new())?)?)
    }

    #[test]
    fn test_parent_index_injection_reaches_subclasses() -> luaclass::Result<()> {
        fn alloc(_: &Lua) -> LuaResult<Box<dyn Any>> {
            Ok(Box::new(()))
        }

        let lua = Lua::new();
        luaclass::open(&lua)?;
        let base = new_class(&lua, "Base", None, &[("hello", hello as Method)])?;
        inject_index(&lua, &base, magic)?;
        new_class(&lua, "Child", Some("Base"), &[("own", own as Method)])?;
        register_native(&lua, ClassDesc::new("Grandchild").with_parent("Child").with_alloc(alloc))?;

        for class in ["Base", "Child", "Grandchild"] {
            let obj = construct(&lua, class, LuaMultiValue::new())?;
            assert_eq!(text(&lua, &obj, "magic")?.as_deref(), Some("W"), "{class}");
            assert_eq!(say(&lua, &obj, "hello")?, "hello", "{class}");
            assert_eq!(text(&lua, &obj, "nothing")?, None, "{class}");
        }
        for class in ["Child", "Grandchild"] {
            let obj = construct(&lua, class, LuaMultiValue::new())?;
            assert_eq!(say(&lua, &obj, "own")?, "own", "{class}");
        }

        // Later injections on the parent are seen as well.
        inject_index(&lua, &base, w1)?;
        let obj = construct(&lua, "Child", LuaMultiValue::new())?;
        assert_eq!(text(&lua, &obj, "a")?.as_deref(), Some("W1"));
        assert_eq!(text(&lua, &obj, "magic")?.as_deref(), Some("W"));
        Ok(())
    }

    #[test]
    fn test_parent_newindex_injection_reaches_subclasses() -> luaclass::Result<()> {
        let lua = Lua::new();
        luaclass::open(&lua)?;
        let base = new_class(&lua, "Base", None, &[])?;
        inject_newindex(&lua, &base, guard)?;
        new_class(&lua, "Child", Some("Base"), &[])?;

        let obj = construct(&lua, "Child", LuaMultiValue::new())?;
        let err = set_index(&obj, "locked", 1).expect_err("guard should refuse");
        assert!(err.to_string().contains("read-only"), "{err}");
        set_index(&obj, "x", 1)?;
        assert_eq!(index(&obj, "x")?, LuaValue::Integer(1));
        Ok(())
    }

    #[test]
    fn test_defer_without_previous() -> luaclass::Result<()> {
        let lua = Lua::new();
        let prev = Previous::new(LuaValue::Nil);
        let object = LuaValue::Table(lua.create_table()?);
        let key = LuaValue::String(lua.create_string("k")?);
        assert!(defer_index(&prev, object.clone(), key.clone())?.is_nil());
        defer_newindex(&prev, object.clone(), key, LuaValue::Boolean(true))?;
        let LuaValue::Table(table) = object else {
            unreachable!();
        };
        assert!(table.raw_get::<LuaValue>("k")?.is_nil());
        Ok(())
    }
}

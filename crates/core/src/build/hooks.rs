use super::context::BuildContext;
use super::registry::{
	ArgSpec, EnumScope, EnumValueSpec, FieldScope, FieldSpec, InputFieldSpec, InputScope, Members,
	ObjectScope,
};
use super::SchemaSpec;
use crate::err::Error;

pub type BuildHook = Box<dyn Fn(&mut BuildContext) -> Result<(), Error> + Send + Sync>;

pub type FieldsHook = Box<
	dyn Fn(Members<FieldSpec>, &ObjectScope, &BuildContext) -> Result<Members<FieldSpec>, Error>
		+ Send
		+ Sync,
>;

pub type ArgsHook = Box<
	dyn Fn(Members<ArgSpec>, &FieldScope<'_>, &BuildContext) -> Result<Members<ArgSpec>, Error>
		+ Send
		+ Sync,
>;

pub type InputFieldsHook = Box<
	dyn Fn(
			Members<InputFieldSpec>,
			&InputScope,
			&BuildContext,
		) -> Result<Members<InputFieldSpec>, Error>
		+ Send
		+ Sync,
>;

pub type EnumValuesHook = Box<
	dyn Fn(Members<EnumValueSpec>, &EnumScope, &BuildContext) -> Result<Members<EnumValueSpec>, Error>
		+ Send
		+ Sync,
>;

pub type SchemaHook = Box<dyn Fn(SchemaSpec, &BuildContext) -> Result<SchemaSpec, Error> + Send + Sync>;

/// A hook together with the name of the plugin which registered it.
pub(crate) struct Registered<H> {
	pub plugin: String,
	pub hook: H,
}

/// The hooks registered by the plugins, per hook kind, in plugin order.
#[derive(Default)]
pub struct Hooks {
	plugin: String,
	pub(crate) build: Vec<Registered<BuildHook>>,
	pub(crate) init: Vec<Registered<BuildHook>>,
	pub(crate) object_fields: Vec<Registered<FieldsHook>>,
	pub(crate) field_args: Vec<Registered<ArgsHook>>,
	pub(crate) input_fields: Vec<Registered<InputFieldsHook>>,
	pub(crate) enum_values: Vec<Registered<EnumValuesHook>>,
	pub(crate) schema: Vec<Registered<SchemaHook>>,
}

impl Hooks {
	/// Attributes the hooks registered from now on to `plugin`.
	pub(crate) fn enter(&mut self, plugin: &str) {
		self.plugin = plugin.to_owned();
	}

	fn wrap<H>(&self, hook: H) -> Registered<H> {
		Registered {
			plugin: self.plugin.clone(),
			hook,
		}
	}

	/// Runs first, before any type exists.
	pub fn build(&mut self, f: impl Fn(&mut BuildContext) -> Result<(), Error> + Send + Sync + 'static) {
		let hook = self.wrap(Box::new(f) as BuildHook);
		self.build.push(hook);
	}

	/// Registers types. Every type must exist once the init hooks have run.
	pub fn init(&mut self, f: impl Fn(&mut BuildContext) -> Result<(), Error> + Send + Sync + 'static) {
		let hook = self.wrap(Box::new(f) as BuildHook);
		self.init.push(hook);
	}

	pub fn object_fields(
		&mut self,
		f: impl Fn(Members<FieldSpec>, &ObjectScope, &BuildContext) -> Result<Members<FieldSpec>, Error>
		+ Send
		+ Sync
		+ 'static,
	) {
		let hook = self.wrap(Box::new(f) as FieldsHook);
		self.object_fields.push(hook);
	}

	pub fn field_args(
		&mut self,
		f: impl Fn(Members<ArgSpec>, &FieldScope<'_>, &BuildContext) -> Result<Members<ArgSpec>, Error>
		+ Send
		+ Sync
		+ 'static,
	) {
		let hook = self.wrap(Box::new(f) as ArgsHook);
		self.field_args.push(hook);
	}

	pub fn input_fields(
		&mut self,
		f: impl Fn(
			Members<InputFieldSpec>,
			&InputScope,
			&BuildContext,
		) -> Result<Members<InputFieldSpec>, Error>
		+ Send
		+ Sync
		+ 'static,
	) {
		let hook = self.wrap(Box::new(f) as InputFieldsHook);
		self.input_fields.push(hook);
	}

	pub fn enum_values(
		&mut self,
		f: impl Fn(
			Members<EnumValueSpec>,
			&EnumScope,
			&BuildContext,
		) -> Result<Members<EnumValueSpec>, Error>
		+ Send
		+ Sync
		+ 'static,
	) {
		let hook = self.wrap(Box::new(f) as EnumValuesHook);
		self.enum_values.push(hook);
	}

	/// Runs last, on the complete schema description.
	pub fn schema(
		&mut self,
		f: impl Fn(SchemaSpec, &BuildContext) -> Result<SchemaSpec, Error> + Send + Sync + 'static,
	) {
		let hook = self.wrap(Box::new(f) as SchemaHook);
		self.schema.push(hook);
	}
}

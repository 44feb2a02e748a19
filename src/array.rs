//! Array operations.

use crate::context::Context;
use crate::error::Result;
use crate::exception::from_just;
use crate::marshal;
use crate::value::{Value, ValueRef};

impl Context {
    pub fn get_index(&self, array: &Value, index: u32) -> Result<Option<ValueRef>> {
        let array = self.owned(array.array_handle()?)?;

        self.try_catch(|tc| {
            let target = array.local(tc);
            let value = from_just(tc, target.get_index(tc, index))?;
            marshal::wrap(self, tc, value)
        })
    }

    pub fn set_index(&self, array: &Value, index: u32, value: Option<&Value>) -> Result<()> {
        let array = self.owned(array.array_handle()?)?;

        self.try_catch(|tc| {
            let target = array.local(tc);
            let value = marshal::unwrap(self, tc, value);
            from_just(tc, target.set_index(tc, index, value))?;
            Ok(())
        })
    }

    pub fn array_length(&self, array: &Value) -> Result<u32> {
        let array = self.owned(array.array_handle()?)?;
        Ok(self.enter(|scope| array.local(scope).length()))
    }

    /// Copy an array into a vector of values.
    pub fn array_to_vec(&self, array: &Value) -> Result<Vec<Option<ValueRef>>> {
        (0..self.array_length(array)?)
            .map(|index| self.get_index(array, index))
            .collect()
    }
}
